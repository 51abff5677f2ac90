//! Outbound information packets and per-player connections.
//!
//! The engine never talks to sockets. Every piece of information a player
//! learns is queued as a [`Packet`] on that player's [`Connection`]. While a
//! connection is frozen, packets accumulate and are released as one
//! [`PacketBatch`] when the last freeze is lifted, so a vision update over
//! many tiles reaches the client in a single delivery.

use crate::types::{
    CityId, ExtraId, ExtraSet, KnownState, PlayerId, TerrainId, TileIndex, UnitId, UnitTypeId,
};
use crate::unit::ActivityType;
use serde::{Deserialize, Serialize};

/// A tile as seen by one player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileInfo {
    pub tile: TileIndex,
    pub known: KnownState,
    pub terrain: Option<TerrainId>,
    pub extras: ExtraSet,
    pub resource: Option<ExtraId>,
    pub owner: Option<PlayerId>,
    pub extras_owner: Option<PlayerId>,
    pub continent: i32,
}

/// Full unit data, sent to the owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitInfo {
    pub id: UnitId,
    pub owner: PlayerId,
    pub nationality: PlayerId,
    pub tile: TileIndex,
    pub utype: UnitTypeId,
    pub hp: i32,
    pub veteran: u8,
    pub moves_left: i32,
    pub fuel: i32,
    pub activity: ActivityType,
    pub activity_target: Option<ExtraId>,
    pub transported_by: Option<UnitId>,
    pub has_orders: bool,
    pub done_moving: bool,
}

/// Reduced unit data, sent to other players who can see the unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitShortInfo {
    pub id: UnitId,
    pub owner: PlayerId,
    pub tile: TileIndex,
    pub utype: UnitTypeId,
    pub hp: i32,
    pub veteran: u8,
    pub activity: ActivityType,
    pub transported: bool,
}

/// City data. Owners get live data, others a copy of their vision site.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityInfo {
    pub id: CityId,
    pub owner: PlayerId,
    pub tile: TileIndex,
    pub name: String,
    pub size: u32,
    pub walls: bool,
    pub occupied: bool,
}

/// Kind of notification message, for client side filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    UnitOrders,
    UnitIllegalAction,
    BadCommand,
    UnitWinAtt,
    UnitLoseAtt,
    UnitWinDef,
    UnitLoseDef,
    UnitBecameVet,
    HutGold,
    HutTech,
    HutMerc,
    HutBarb,
    HutBarbCityNear,
    HutMap,
    HutFrighten,
    CityLost,
    CityTransfer,
    WorkerDone,
}

/// Everything the engine can tell a client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Packet {
    TileInfo(TileInfo),
    UnitInfo(UnitInfo),
    UnitShortInfo(UnitShortInfo),
    UnitRemove {
        id: UnitId,
    },
    CityInfo(CityInfo),
    CityShortInfo(CityInfo),
    CityRemove {
        id: CityId,
    },
    Notify {
        tile: Option<TileIndex>,
        event: EventType,
        message: String,
    },
}

/// Packets delivered together.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PacketBatch {
    /// Batch identifier, increasing per connection.
    pub batch_id: u64,
    pub packets: Vec<Packet>,
}

impl PacketBatch {
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}

/// Statistics for a connection.
#[derive(Clone, Debug, Default)]
pub struct ConnectionStats {
    /// Total packets queued.
    pub packets_sent: u64,
    /// Total batches released.
    pub batches_sent: u64,
    /// Largest batch released so far.
    pub largest_batch: usize,
}

/// Outbound queue of one player.
#[derive(Clone, Debug)]
pub struct Connection {
    pub player: PlayerId,
    freeze_level: u32,
    pending: Vec<Packet>,
    outbox: Vec<PacketBatch>,
    next_batch_id: u64,
    stats: ConnectionStats,
}

impl Connection {
    pub fn new(player: PlayerId) -> Self {
        Self {
            player,
            freeze_level: 0,
            pending: Vec::new(),
            outbox: Vec::new(),
            next_batch_id: 1,
            stats: ConnectionStats::default(),
        }
    }

    /// Queue a packet. Unfrozen connections release it at once.
    pub fn send(&mut self, packet: Packet) {
        self.stats.packets_sent += 1;
        self.pending.push(packet);
        if self.freeze_level == 0 {
            self.flush();
        }
    }

    /// Hold packets until the matching [`Connection::thaw`]. Nests.
    pub fn freeze(&mut self) {
        self.freeze_level += 1;
    }

    /// Lift one freeze; the outermost thaw releases the held packets.
    pub fn thaw(&mut self) {
        if self.freeze_level == 0 {
            tracing::error!(player = self.player, "connection thawed more often than frozen");
            debug_assert!(false, "unbalanced connection thaw");
            return;
        }
        self.freeze_level -= 1;
        if self.freeze_level == 0 {
            self.flush();
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.freeze_level > 0
    }

    /// Packets held by a freeze.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Remove and return every released batch.
    pub fn take_batches(&mut self) -> Vec<PacketBatch> {
        std::mem::take(&mut self.outbox)
    }

    /// Remove and return every released packet, flattened.
    pub fn take_packets(&mut self) -> Vec<Packet> {
        self.take_batches()
            .into_iter()
            .flat_map(|b| b.packets)
            .collect()
    }

    /// Released packets not yet taken.
    pub fn outbox(&self) -> impl Iterator<Item = &Packet> {
        self.outbox.iter().flat_map(|b| b.packets.iter())
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let packets = std::mem::take(&mut self.pending);
        self.stats.batches_sent += 1;
        self.stats.largest_batch = self.stats.largest_batch.max(packets.len());
        self.outbox.push(PacketBatch {
            batch_id: self.next_batch_id,
            packets,
        });
        self.next_batch_id += 1;
    }
}
