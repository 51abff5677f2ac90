//! Tileset loading and the per-tile draw entry points.

use crate::capability::{check_capabilities, has_capability, SPEC_CAPSTR, TILESPEC_CAPSTR};
use crate::error::{tileset_error, LogLevel, TilesetError};
use crate::layer::city::CitySprites;
use crate::layer::grid::GridSprites;
use crate::layer::terrain::{blend_pieces, MAX_NUM_LAYERS};
use crate::layer::{
    BackgroundLayer, BaseFlagsLayer, CityLayer, Corner, DarknessLayer, DrawContext, DrawnSprite,
    Edge, EdgeKind, ExtraGraphics, ExtraSprites, ExtraStyle, FogLayer, Geometry, GridLayer, Layer,
    LayerKind, OverlaysLayer, RoadsLayer, SpecialLayer, TerrainLayer, TerrainTag,
    UnitDecorations, UnitSprites, UnitsLayer, WaterLayer,
};
use crate::secfile::{SectionFile, Value};
use crate::source::TilesetSource;
use crate::sprite::{Rgb, Sprite, SpriteId, SpriteStore};
use crate::view::MapView;
use freeciv_core::packets::CityInfo;
use freeciv_core::{ActivityType, ExtraId, PlayerId, Ruleset, TileIndex, UnitTypeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Tileset tried when the requested one cannot be loaded.
pub const DEFAULT_TILESET: &str = "trident";

/// Projection of the map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TilesetType {
    Overhead,
    Isometric,
}

impl TilesetType {
    fn parse(name: &str) -> Result<TilesetType, TilesetError> {
        match name {
            "overhead" => Ok(TilesetType::Overhead),
            "isometric" => Ok(TilesetType::Isometric),
            "hexagonal" | "isohex" | "hex" => Err(TilesetError::HexUnsupported),
            other => Err(TilesetError::UnknownType(other.to_string())),
        }
    }
}

/// How fogged tiles are shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FogStyle {
    /// The renderer darkens foggable sprites itself.
    Auto,
    /// A `tx.fog` sprite is drawn over fogged tiles.
    Sprite,
    /// Corner fog sprites are drawn, with corner darkness.
    Darkness,
}

/// How unknown neighbours darken a known tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DarknessStyle {
    None,
    /// One darkness sprite cut into four quarters.
    IsoRect,
    /// One sprite per unknown cardinal neighbour.
    CardinalSingle,
    /// One sprite per combination of unknown cardinal neighbours.
    CardinalFull,
    /// Drawn at tile corners by the fog layer.
    Corner,
}

fn named<T: Copy>(
    table: &[(&str, T)],
    what: &str,
    name: &str,
) -> Result<T, TilesetError> {
    table
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| *v)
        .ok_or_else(|| TilesetError::Fatal(format!("Unknown {what} \"{name}\".")))
}

/// Client drawing toggles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilesetOptions {
    pub draw_terrain: bool,
    pub draw_roads: bool,
    /// Irrigation, mines, huts, resources and bases.
    pub draw_specials: bool,
    pub draw_cities: bool,
    pub draw_units: bool,
    /// Draw the focus unit even when other units are hidden.
    pub draw_focus_unit: bool,
    pub draw_map_grid: bool,
    pub draw_borders: bool,
    pub draw_fog_of_war: bool,
    pub solid_color_behind_units: bool,
}

impl Default for TilesetOptions {
    fn default() -> Self {
        Self {
            draw_terrain: true,
            draw_roads: true,
            draw_specials: true,
            draw_cities: true,
            draw_units: true,
            draw_focus_unit: false,
            draw_map_grid: false,
            draw_borders: true,
            draw_fog_of_war: true,
            solid_color_behind_units: false,
        }
    }
}

impl TilesetOptions {
    /// Parse options from JSON; absent keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, TilesetError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A loaded tileset: sprites, layers and the tables behind them.
#[derive(Clone, Debug)]
pub struct Tileset {
    name: String,
    tileset_type: TilesetType,
    geometry: Geometry,
    small_tile_size: (u32, u32),
    unit_offset: (i32, i32),
    city_offset: (i32, i32),
    fog_style: FogStyle,
    darkness_style: DarknessStyle,
    city_style: String,
    sprites: SpriteStore,
    layers: Vec<Layer>,
    terrain_tags: Vec<TerrainTag>,
    /// Graphic tag to style, from the `[extras] styles` table.
    extra_styles: BTreeMap<String, ExtraStyle>,
    unit_types: Vec<Option<UnitSprites>>,
    decorations: UnitDecorations,
    city_sprites: CitySprites,
    grid_sprites: GridSprites,
    attention: Option<SpriteId>,
    options: TilesetOptions,
}

impl Tileset {
    /// Load `{name}.tilespec` and every sprite file it lists, then prepare
    /// it for `ruleset`.
    pub fn load(
        source: &dyn TilesetSource,
        name: &str,
        ruleset: &Ruleset,
    ) -> Result<Tileset, TilesetError> {
        let path = format!("{name}.tilespec");
        info!(tileset = name, "loading tileset");
        let file = SectionFile::load(source, &path)?;

        let options = file.lookup_str("tilespec", "options")?;
        check_capabilities(TILESPEC_CAPSTR, options)
            .map_err(|e| TilesetError::capability(&path, e))?;

        if file.lookup_bool_default(false, "tilespec", "is_hex")? {
            return Err(TilesetError::HexUnsupported);
        }
        let tileset_type =
            TilesetType::parse(file.lookup_str_default("overhead", "tilespec", "type")?)?;

        let dimension = |key: &str, default: i64| -> Result<u32, TilesetError> {
            let value = file.lookup_int_default(default, "tilespec", key)?;
            u32::try_from(value)
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| TilesetError::Fatal(format!("{key} must be positive, got {value}.")))
        };
        let geometry = Geometry {
            tile_width: dimension("normal_tile_width", 0)?,
            tile_height: dimension("normal_tile_height", 0)?,
            isometric: tileset_type == TilesetType::Isometric,
        };
        let small_tile_size = (
            dimension("small_tile_width", 15)?,
            dimension("small_tile_height", 20)?,
        );
        let offset = |x: &str, y: &str| -> Result<(i32, i32), TilesetError> {
            Ok((
                file.lookup_int_default(0, "tilespec", x)? as i32,
                file.lookup_int_default(0, "tilespec", y)? as i32,
            ))
        };
        let unit_offset = offset("unit_offset_x", "unit_offset_y")?;
        let city_offset = offset("city_offset_x", "city_offset_y")?;

        let fog_style = named(
            &[
                ("Auto", FogStyle::Auto),
                ("Sprite", FogStyle::Sprite),
                ("Darkness", FogStyle::Darkness),
            ],
            "fog style",
            file.lookup_str_default("Auto", "tilespec", "fog_style")?,
        )?;
        let darkness_style = named(
            &[
                ("None", DarknessStyle::None),
                ("IsoRect", DarknessStyle::IsoRect),
                ("CardinalSingle", DarknessStyle::CardinalSingle),
                ("CardinalFull", DarknessStyle::CardinalFull),
                ("Corner", DarknessStyle::Corner),
            ],
            "darkness style",
            file.lookup_str_default("None", "tilespec", "darkness_style")?,
        )?;
        if (darkness_style == DarknessStyle::Corner) != (fog_style == FogStyle::Darkness) {
            return Err(TilesetError::Fatal(
                "Corner darkness and the Darkness fog style must be used together.".to_string(),
            ));
        }
        if darkness_style == DarknessStyle::IsoRect && !geometry.isometric {
            return Err(TilesetError::Fatal(
                "IsoRect darkness needs an isometric tileset.".to_string(),
            ));
        }

        let layer_order = parse_layer_order(&file.lookup_str_vec("tilespec", "layer_order")?)?;
        let match_types = parse_match_types(&file)?;

        let mut terrain_tags = Vec::new();
        let sections: Vec<String> = file
            .sections_with_prefix("tile_")
            .chain(file.sections_with_prefix("terrain_"))
            .map(|s| s.name.clone())
            .collect();
        for section in &sections {
            terrain_tags.push(TerrainTag::parse(&file, section, &match_types)?);
        }

        let extra_styles = parse_extra_styles(&file)?;

        let mut sprites = SpriteStore::new();
        for spec in file.lookup_str_vec("tilespec", "files")? {
            load_spec_file(source, spec, &mut sprites, &geometry)?;
        }
        debug!(
            tileset = name,
            sprites = sprites.len(),
            tags = sprites.tag_count(),
            "sprite files loaded"
        );

        let decorations = UnitDecorations::load(&sprites, ruleset.max_veteran_level());
        let city_style = file
            .lookup_str_default("european", "tilespec", "city_style")?
            .to_string();
        let city_sprites = CitySprites::load(&sprites, &city_style)?;
        let grid_sprites = GridSprites::load(&sprites);
        let attention = sprites.lookup("user.attention");

        let mut layers = Vec::with_capacity(layer_order.len());
        for kind in layer_order {
            let layer = match kind {
                LayerKind::Background => Layer::Background(BackgroundLayer::new(
                    (geometry.tile_width, geometry.tile_height),
                    &mut sprites,
                )),
                LayerKind::Terrain1 | LayerKind::Terrain2 | LayerKind::Terrain3 => {
                    let number = match kind {
                        LayerKind::Terrain1 => 0,
                        LayerKind::Terrain2 => 1,
                        _ => 2,
                    };
                    Layer::Terrain(TerrainLayer::new(
                        number,
                        geometry,
                        match_types[number].clone(),
                    ))
                }
                LayerKind::Darkness => Layer::Darkness(DarknessLayer::load(
                    darkness_style,
                    &mut sprites,
                    &geometry,
                )?),
                LayerKind::Water => Layer::Water(WaterLayer::new()),
                LayerKind::Roads => Layer::Roads(RoadsLayer::new()),
                LayerKind::Special1 => Layer::Special(SpecialLayer::new(1)),
                LayerKind::Special2 => Layer::Special(SpecialLayer::new(2)),
                LayerKind::Special3 => Layer::Special(SpecialLayer::new(3)),
                LayerKind::Grid1 => Layer::Grid(GridLayer::new(1, geometry, grid_sprites)),
                LayerKind::Grid2 => Layer::Grid(GridLayer::new(2, geometry, grid_sprites)),
                LayerKind::City1 => {
                    Layer::City(CityLayer::new(1, city_offset, city_sprites.clone()))
                }
                LayerKind::City2 => {
                    Layer::City(CityLayer::new(2, city_offset, city_sprites.clone()))
                }
                LayerKind::Fog => {
                    Layer::Fog(FogLayer::load(fog_style, darkness_style, &sprites)?)
                }
                LayerKind::Unit | LayerKind::FocusUnit => Layer::Units(UnitsLayer::new(
                    kind == LayerKind::FocusUnit,
                    unit_offset,
                    (geometry.tile_width, geometry.tile_height),
                    decorations.clone(),
                )),
                LayerKind::BaseFlags => Layer::BaseFlags(BaseFlagsLayer::new(
                    (geometry.tile_width / 3, geometry.tile_height / 3),
                    unit_offset,
                )),
                LayerKind::Overlays => Layer::Overlays(OverlaysLayer::new(attention)),
                LayerKind::TileLabel
                | LayerKind::Goto
                | LayerKind::WorkerTask
                | LayerKind::Editor
                | LayerKind::Infrawork => Layer::Passive(kind),
            };
            layers.push(layer);
        }

        let mut tileset = Tileset {
            name: file
                .lookup_str_default(name, "tilespec", "name")?
                .to_string(),
            tileset_type,
            geometry,
            small_tile_size,
            unit_offset,
            city_offset,
            fog_style,
            darkness_style,
            city_style,
            sprites,
            layers,
            terrain_tags,
            extra_styles,
            unit_types: Vec::new(),
            decorations,
            city_sprites,
            grid_sprites,
            attention,
            options: TilesetOptions::default(),
        };
        tileset.initialize(ruleset)?;
        info!(tileset = name, layers = tileset.layers.len(), "tileset ready");
        Ok(tileset)
    }

    /// Load `name`, falling back to the default tileset from the same source.
    pub fn load_or_default(
        source: &dyn TilesetSource,
        name: &str,
        ruleset: &Ruleset,
    ) -> Result<Tileset, TilesetError> {
        match Tileset::load(source, name, ruleset) {
            Ok(tileset) => Ok(tileset),
            Err(e) if name != DEFAULT_TILESET => {
                warn!(tileset = name, error = %e, "falling back to {}", DEFAULT_TILESET);
                Tileset::load(source, DEFAULT_TILESET, ruleset)
            }
            Err(e) => Err(e),
        }
    }

    /// Prepare every ruleset-dependent table. Called again after a ruleset
    /// change.
    pub fn initialize(&mut self, ruleset: &Ruleset) -> Result<(), TilesetError> {
        self.initialize_terrain(ruleset)?;
        for extra in 0..ruleset.extras.len() {
            self.setup_extra(ruleset, extra as ExtraId)?;
        }
        self.unit_types.clear();
        for utype in 0..ruleset.unit_types.len() {
            self.setup_unit_type(ruleset, utype as UnitTypeId)?;
        }
        Ok(())
    }

    /// Resolve the tile section of every terrain and build the terrain
    /// layers' tables.
    pub fn initialize_terrain(&mut self, ruleset: &Ruleset) -> Result<(), TilesetError> {
        let mut tags: Vec<&TerrainTag> = Vec::with_capacity(ruleset.terrains.len());
        for terrain in &ruleset.terrains {
            let tag = self
                .terrain_tags
                .iter()
                .find(|t| t.name == terrain.graphic_str)
                .or_else(|| {
                    self.terrain_tags
                        .iter()
                        .find(|t| t.name == terrain.graphic_alt)
                })
                .ok_or_else(|| {
                    TilesetError::Fatal(format!(
                        "Terrain \"{}\": no graphic tag \"{}\" or \"{}\".",
                        terrain.name, terrain.graphic_str, terrain.graphic_alt
                    ))
                })?;
            tags.push(tag);
        }

        let mut blends = Vec::with_capacity(tags.len());
        for tag in &tags {
            let Some(layer) = tag.blend_layer else {
                blends.push(None);
                continue;
            };
            let blender = self
                .sprites
                .lookup(&format!("t.blend.{}", tag.name))
                .or_else(|| self.sprites.lookup(&format!("t.l{layer}.{}1", tag.name)));
            match blender {
                Some(blender) => blends.push(blend_pieces(&mut self.sprites, blender, &self.geometry)),
                None => {
                    tileset_error(
                        LogLevel::Error,
                        format!("Cannot blend \"{}\" without a blender sprite.", tag.name),
                    )?;
                    blends.push(None);
                }
            }
        }

        for layer in &mut self.layers {
            layer.initialize_terrain(ruleset, &mut self.sprites, &tags, &blends)?;
        }
        Ok(())
    }

    /// Resolve the sprites of one extra type and hand them to the layers.
    pub fn setup_extra(&mut self, ruleset: &Ruleset, extra: ExtraId) -> Result<(), TilesetError> {
        let info = ruleset.extra(extra);
        let (tag, style) = [&info.graphic_str, &info.graphic_alt]
            .into_iter()
            .find_map(|tag| self.extra_styles.get(tag.as_str()).map(|s| (tag, *s)))
            .ok_or_else(|| {
                TilesetError::Fatal(format!(
                    "Extra \"{}\": no style for \"{}\" or \"{}\".",
                    info.name, info.graphic_str, info.graphic_alt
                ))
            })?;
        let sprites = ExtraSprites {
            graphics: ExtraGraphics::load(&self.sprites, style, tag)?,
            is_base: info.is_base(),
        };
        for layer in &mut self.layers {
            layer.setup_extra(extra, &sprites);
        }
        Ok(())
    }

    /// Resolve the sprite of one unit type.
    pub fn setup_unit_type(
        &mut self,
        ruleset: &Ruleset,
        utype: UnitTypeId,
    ) -> Result<(), TilesetError> {
        let info = ruleset.unit_type(utype);
        let sprite = self
            .sprites
            .lookup_alt(&info.graphic_str, &info.graphic_alt)
            .ok_or_else(|| {
                TilesetError::Fatal(format!(
                    "Unit type \"{}\": no sprite \"{}\" or \"{}\".",
                    info.name, info.graphic_str, info.graphic_alt
                ))
            })?;
        let sprites = UnitSprites {
            sprite,
            max_hp: info.hp,
        };
        crate::layer::set_indexed(&mut self.unit_types, utype as usize, Some(sprites));
        for layer in &mut self.layers {
            layer.setup_unit_type(utype, &sprites);
        }
        Ok(())
    }

    /// Create the sprites coloured for `player`.
    pub fn initialize_player(&mut self, player: PlayerId, color: Rgb) {
        for layer in &mut self.layers {
            layer.initialize_player(player, color, &mut self.sprites);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tileset_type(&self) -> TilesetType {
        self.tileset_type
    }

    pub fn is_isometric(&self) -> bool {
        self.geometry.isometric
    }

    pub fn tile_width(&self) -> u32 {
        self.geometry.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.geometry.tile_height
    }

    pub fn small_tile_size(&self) -> (u32, u32) {
        self.small_tile_size
    }

    pub fn unit_offset(&self) -> (i32, i32) {
        self.unit_offset
    }

    pub fn city_offset(&self) -> (i32, i32) {
        self.city_offset
    }

    pub fn fog_style(&self) -> FogStyle {
        self.fog_style
    }

    pub fn darkness_style(&self) -> DarknessStyle {
        self.darkness_style
    }

    pub fn city_style(&self) -> &str {
        &self.city_style
    }

    pub fn options(&self) -> &TilesetOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: TilesetOptions) {
        self.options = options;
    }

    pub fn sprites(&self) -> &SpriteStore {
        &self.sprites
    }

    pub fn sprite(&self, id: SpriteId) -> Option<&Sprite> {
        self.sprites.get(id)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, kind: LayerKind) -> Option<&Layer> {
        self.layers.iter().find(|l| l.kind() == kind)
    }

    pub fn terrain_tags(&self) -> &[TerrainTag] {
        &self.terrain_tags
    }

    pub fn get_unit_sprite(&self, utype: UnitTypeId) -> Option<SpriteId> {
        self.unit_types
            .get(utype as usize)
            .copied()
            .flatten()
            .map(|u| u.sprite)
    }

    pub fn get_city_sprite(&self, city: &CityInfo) -> Option<SpriteId> {
        self.city_sprites.city_sprite(city)
    }

    pub fn get_activity_sprite(&self, activity: ActivityType) -> Option<SpriteId> {
        self.decorations.activity(activity)
    }

    pub fn get_attention_crosshair(&self) -> Option<SpriteId> {
        self.attention
    }

    /// Darkness sprite `index`: a cardinal direction, or a cardinal mask
    /// for the full style.
    pub fn get_darkness_sprite(&self, index: usize) -> Option<SpriteId> {
        self.layers.iter().find_map(|l| match l {
            Layer::Darkness(d) => d.sprite(index),
            _ => None,
        })
    }

    pub fn get_fog_sprite(&self) -> Option<SpriteId> {
        self.layers.iter().find_map(|l| match l {
            Layer::Fog(f) => f.fog_sprite(),
            _ => None,
        })
    }

    pub fn get_grid_sprite(&self, kind: EdgeKind) -> Option<SpriteId> {
        self.grid_sprites.main[kind.index()]
    }

    /// Sprites of one layer for `ctx`; empty if the tileset has no such
    /// layer.
    pub fn fill_sprite_array(
        &self,
        kind: LayerKind,
        ctx: &DrawContext,
        view: &dyn MapView,
    ) -> Vec<DrawnSprite> {
        self.layer(kind)
            .map(|l| l.fill_sprite_array(ctx, view, &self.options))
            .unwrap_or_default()
    }

    /// Everything drawn for `tile`, its north and west edges and its
    /// north-west corner, bottom layer first.
    pub fn render_tile(&self, view: &dyn MapView, tile: TileIndex) -> Vec<DrawnSprite> {
        let contexts = [
            DrawContext::tile(tile),
            DrawContext::edge(Edge::north_of(view, tile)),
            DrawContext::edge(Edge::west_of(view, tile)),
            DrawContext::corner(Corner::north_west_of(view, tile)),
        ];
        let mut out = Vec::new();
        for layer in &self.layers {
            for ctx in &contexts {
                out.extend(layer.fill_sprite_array(ctx, view, &self.options));
            }
        }
        out
    }
}

/// The listed layer kinds, then any missing ones in default order.
pub fn parse_layer_order(names: &[&str]) -> Result<Vec<LayerKind>, TilesetError> {
    if names.is_empty() {
        return Ok(LayerKind::ALL.to_vec());
    }
    let mut order = Vec::with_capacity(LayerKind::COUNT);
    for name in names {
        let kind =
            LayerKind::from_name(name).ok_or_else(|| TilesetError::UnknownLayer(name.to_string()))?;
        if order.contains(&kind) {
            return Err(TilesetError::DuplicateLayer(name.to_string()));
        }
        order.push(kind);
    }
    for kind in LayerKind::ALL {
        if !order.contains(&kind) {
            tileset_error(
                LogLevel::Normal,
                format!("layer_order is missing \"{kind}\", adding it."),
            )?;
            order.push(kind);
        }
    }
    Ok(order)
}

/// Group names of each terrain layer. Names must differ in their first
/// letter since pair tags use initials.
fn parse_match_types(file: &SectionFile) -> Result<Vec<Vec<String>>, TilesetError> {
    let mut all = Vec::with_capacity(MAX_NUM_LAYERS);
    for l in 0..MAX_NUM_LAYERS {
        let types: Vec<String> = file
            .lookup_str_vec(&format!("layer{l}"), "match_types")?
            .into_iter()
            .map(str::to_string)
            .collect();
        for (i, a) in types.iter().enumerate() {
            for b in &types[i + 1..] {
                if a.chars().next() == b.chars().next() {
                    return Err(TilesetError::Fatal(format!(
                        "[layer{l}] match types \"{a}\" and \"{b}\" share their first letter."
                    )));
                }
            }
        }
        all.push(types);
    }
    Ok(all)
}

fn parse_extra_styles(file: &SectionFile) -> Result<BTreeMap<String, ExtraStyle>, TilesetError> {
    let mut styles = BTreeMap::new();
    if file.lookup("extras", "styles").is_none() {
        return Ok(styles);
    }
    let table = file.lookup_table("extras", "styles")?;
    for row in 0..table.rows.len() {
        let (Some(name), Some(style)) = (
            table.get(row, "name").and_then(Value::as_str),
            table.get(row, "style").and_then(Value::as_str),
        ) else {
            tileset_error(LogLevel::Error, format!("[extras] styles row {row} is incomplete."))?;
            continue;
        };
        let style = ExtraStyle::from_name(style).ok_or_else(|| {
            TilesetError::Fatal(format!("Unknown extra style \"{style}\" for \"{name}\"."))
        })?;
        styles.insert(name.to_string(), style);
    }
    Ok(styles)
}

/// Register the sprites of one `.spec` file.
fn load_spec_file(
    source: &dyn TilesetSource,
    path: &str,
    sprites: &mut SpriteStore,
    geometry: &Geometry,
) -> Result<(), TilesetError> {
    let spec = SectionFile::load(source, path)?;
    let options = spec.lookup_str("spec", "options")?;
    check_capabilities(SPEC_CAPSTR, options).map_err(|e| TilesetError::capability(path, e))?;
    let duplicates_ok = has_capability("duplicates_ok", options);

    let grids: Vec<String> = spec
        .sections_with_prefix("grid_")
        .map(|s| s.name.clone())
        .collect();
    if !grids.is_empty() {
        let gfx = spec.lookup_str("file", "gfx")?;
        for grid in &grids {
            let x_top_left = spec.lookup_int_default(0, grid, "x_top_left")?;
            let y_top_left = spec.lookup_int_default(0, grid, "y_top_left")?;
            let dx = spec.lookup_int(grid, "dx")?;
            let dy = spec.lookup_int(grid, "dy")?;
            let border = spec.lookup_int_default(0, grid, "pixel_border")?;
            let tiles = spec.lookup_table(grid, "tiles")?;

            for row in 0..tiles.rows.len() {
                let (Some(r), Some(c)) = (
                    tiles.get(row, "row").and_then(Value::as_int),
                    tiles.get(row, "column").and_then(Value::as_int),
                ) else {
                    tileset_error(
                        LogLevel::Error,
                        format!("{path} [{grid}] row {row} has no position."),
                    )?;
                    continue;
                };
                let x = x_top_left + border + c * (dx + border);
                let y = y_top_left + border + r * (dy + border);
                if x < 0 || y < 0 || dx <= 0 || dy <= 0 {
                    tileset_error(
                        LogLevel::Error,
                        format!("{path} [{grid}] row {row} is outside the image."),
                    )?;
                    continue;
                }
                let sprite = Sprite::Region {
                    file: gfx.to_string(),
                    x: x as u32,
                    y: y as u32,
                    width: dx as u32,
                    height: dy as u32,
                };
                for tag in tiles.get_from(row, "tag").iter().filter_map(Value::as_str) {
                    sprites.register(tag, sprite.clone(), duplicates_ok, path);
                }
            }
        }
    }

    if spec.lookup("extra", "sprites").is_some() {
        let table = spec.lookup_table("extra", "sprites")?;
        for row in 0..table.rows.len() {
            let (Some(tag), Some(file)) = (
                table.get(row, "tag").and_then(Value::as_str),
                table.get(row, "file").and_then(Value::as_str),
            ) else {
                continue;
            };
            let sprite = Sprite::Region {
                file: file.to_string(),
                x: 0,
                y: 0,
                width: geometry.tile_width,
                height: geometry.tile_height,
            };
            sprites.register(tag, sprite, duplicates_ok, path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    fn classic() -> Ruleset {
        Ruleset::classic()
    }

    // ==========================================================================
    // Layer Order
    // ==========================================================================

    #[test]
    fn test_empty_layer_order_is_default() {
        assert_eq!(parse_layer_order(&[]).unwrap(), LayerKind::ALL.to_vec());
    }

    #[test]
    fn test_missing_layers_are_appended() {
        let order = parse_layer_order(&["Terrain1", "Background"]).unwrap();
        assert_eq!(order.len(), LayerKind::COUNT);
        assert_eq!(order[0], LayerKind::Terrain1);
        assert_eq!(order[1], LayerKind::Background);
        assert_eq!(order[2], LayerKind::Darkness);
    }

    #[test]
    fn test_bad_layer_order() {
        assert!(matches!(
            parse_layer_order(&["Terrain9"]),
            Err(TilesetError::UnknownLayer(_))
        ));
        assert!(matches!(
            parse_layer_order(&["Fog", "Fog"]),
            Err(TilesetError::DuplicateLayer(_))
        ));
    }

    // ==========================================================================
    // Loading
    // ==========================================================================

    #[test]
    fn test_builtin_loads() {
        let tileset = Tileset::load(&MemorySource::builtin(), "trident", &classic()).unwrap();
        assert_eq!(tileset.name(), "Trident");
        assert_eq!(tileset.tileset_type(), TilesetType::Overhead);
        assert_eq!((tileset.tile_width(), tileset.tile_height()), (30, 30));
        assert_eq!(tileset.layers().len(), LayerKind::COUNT);
        assert!(tileset.get_unit_sprite(2).is_some());
        assert!(tileset.get_activity_sprite(ActivityType::Fortified).is_some());
        assert!(tileset.get_activity_sprite(ActivityType::Idle).is_none());
        assert!(tileset.get_attention_crosshair().is_some());
        assert!(tileset.get_fog_sprite().is_some());
        assert!(tileset.get_grid_sprite(EdgeKind::WestEast).is_some());
        assert!(tileset.get_darkness_sprite(0).is_some());
    }

    #[test]
    fn test_missing_tileset_falls_back() {
        let source = MemorySource::builtin();
        assert!(Tileset::load(&source, "amplio", &classic()).is_err());
        let tileset = Tileset::load_or_default(&source, "amplio", &classic()).unwrap();
        assert_eq!(tileset.name(), "Trident");
    }

    #[test]
    fn test_missing_default_is_an_error() {
        let source = MemorySource::new();
        assert!(Tileset::load_or_default(&source, DEFAULT_TILESET, &classic()).is_err());
    }

    #[test]
    fn test_options_default() {
        let options = TilesetOptions::from_json(r#"{"draw_map_grid": true}"#).unwrap();
        assert!(options.draw_map_grid);
        assert!(options.draw_terrain);
        assert!(!options.solid_color_behind_units);
    }

    #[test]
    fn test_options_bad_json() {
        assert!(matches!(
            TilesetOptions::from_json(r#"{"draw_terrain": "yes"}"#),
            Err(TilesetError::Options(_))
        ));
    }
}
