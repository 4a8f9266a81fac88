use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use roxmltree::{Document, Node};
use tracing::debug;

use crate::AppPaths;

use super::database::{
    CompletionRule, DamageModel, DefDatabase, LevelArchetype, LevelDefId, LevelTuning,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateDef,
}

#[derive(Debug, Clone)]
pub struct ContentCompileError {
    pub code: ContentErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ContentCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (file={}, line={}, column={})",
                self.code,
                self.message,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (file={})",
                self.code,
                self.message,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for ContentCompileError {}

/// Compiles every `*.xml` under the base content directory, in path order.
/// A defName may appear only once across all files.
pub fn compile_def_database(app_paths: &AppPaths) -> Result<DefDatabase, ContentCompileError> {
    let xml_files = collect_xml_files_sorted(&app_paths.base_content_dir)
        .map_err(|error| read_error(error.path, error.source))?;

    let mut sources = Vec::with_capacity(xml_files.len());
    for xml_file in xml_files {
        let raw =
            fs::read_to_string(&xml_file).map_err(|source| read_error(xml_file.clone(), source))?;
        sources.push((xml_file, raw));
    }

    compile_sources(
        sources
            .iter()
            .map(|(path, raw)| (path.as_path(), raw.as_str())),
    )
}

/// Compiles defs from in-memory documents; `file_path` only labels errors.
pub fn compile_defs_from_str(
    file_path: &Path,
    raw: &str,
) -> Result<DefDatabase, ContentCompileError> {
    compile_sources(std::iter::once((file_path, raw)))
}

fn compile_sources<'a>(
    sources: impl Iterator<Item = (&'a Path, &'a str)>,
) -> Result<DefDatabase, ContentCompileError> {
    let mut merged = BTreeMap::<String, LevelArchetype>::new();
    for (file_path, raw) in sources {
        for def in parse_defs_document(file_path, raw)? {
            if merged.contains_key(&def.def_name) {
                return Err(ContentCompileError {
                    code: ContentErrorCode::DuplicateDef,
                    message: format!(
                        "duplicate LevelDef '{}'; each defName may be defined only once",
                        def.def_name
                    ),
                    file_path: file_path.to_path_buf(),
                    location: None,
                });
            }
            debug!(def_name = %def.def_name, file = %file_path.display(), "level_def_parsed");
            merged.insert(def.def_name.clone(), def);
        }
    }
    Ok(DefDatabase::from_level_defs(merged.into_values().collect()))
}

fn parse_defs_document(
    file_path: &Path,
    raw: &str,
) -> Result<Vec<LevelArchetype>, ContentCompileError> {
    let doc = Document::parse(raw).map_err(|error| ContentCompileError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;
    let ctx = DocContext {
        file_path,
        doc: &doc,
    };

    let root = doc.root_element();
    if root.tag_name().name() != "Defs" {
        return Err(ctx.error_at(
            ContentErrorCode::InvalidRoot,
            "root element must be <Defs>".to_string(),
            root,
        ));
    }

    let mut defs = Vec::new();
    for child in root.children().filter(|node| node.is_element()) {
        if child.tag_name().name() != "LevelDef" {
            return Err(ctx.error_at(
                ContentErrorCode::UnknownDefType,
                format!(
                    "unsupported def type <{}>; only <LevelDef> is supported",
                    child.tag_name().name()
                ),
                child,
            ));
        }
        defs.push(parse_level_def(&ctx, child)?);
    }
    Ok(defs)
}

fn parse_level_def(
    ctx: &DocContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<LevelArchetype, ContentCompileError> {
    let mut seen_fields = HashSet::<String>::new();
    let mut def_name: Option<String> = None;
    let mut label: Option<String> = None;
    let mut tuning = LevelTuning::default();

    for field in node.children().filter(|child| child.is_element()) {
        let field_name = field.tag_name().name();
        if !seen_fields.insert(field_name.to_string()) {
            return Err(ctx.error_at(
                ContentErrorCode::DuplicateField,
                format!("duplicate field <{field_name}> in <LevelDef>"),
                field,
            ));
        }

        match field_name {
            "defName" => def_name = Some(ctx.required_text(field, field_name)?),
            "label" => label = Some(ctx.required_text(field, field_name)?),
            "worldHalfExtent" => tuning.world_half_extent = ctx.positive_f32(field, field_name)?,
            "spawnHalfExtent" => tuning.spawn_half_extent = ctx.positive_f32(field, field_name)?,
            "timeLimitSeconds" => {
                tuning.time_limit_seconds = ctx.number::<u32>(field, field_name)?;
                if tuning.time_limit_seconds == 0 {
                    return Err(ctx.error_at(
                        ContentErrorCode::InvalidValue,
                        "timeLimitSeconds must be >= 1".to_string(),
                        field,
                    ));
                }
            }
            "playerSpeed" => tuning.player_speed = ctx.non_negative_f32(field, field_name)?,
            "playerRadius" => tuning.player_radius = ctx.non_negative_f32(field, field_name)?,
            "treeCount" => tuning.tree_count = ctx.number(field, field_name)?,
            "treeRadius" => tuning.tree_radius = ctx.non_negative_f32(field, field_name)?,
            "spawnClearing" => tuning.spawn_clearing = ctx.non_negative_f32(field, field_name)?,
            "fragmentCount" => tuning.fragment_count = ctx.number(field, field_name)?,
            "pickupRadius" => tuning.pickup_radius = ctx.positive_f32(field, field_name)?,
            "guardCount" => tuning.guard_count = ctx.number(field, field_name)?,
            "guardOffset" => tuning.guard_offset = ctx.non_negative_f32(field, field_name)?,
            "enemyCount" => tuning.enemy_count = ctx.number(field, field_name)?,
            "chaseSpeed" => tuning.chase_speed = ctx.non_negative_f32(field, field_name)?,
            "detectionRange" => tuning.detection_range = ctx.non_negative_f32(field, field_name)?,
            "wanderSpeed" => tuning.wander_speed = ctx.non_negative_f32(field, field_name)?,
            "wanderTurnInterval" => {
                tuning.wander_turn_interval_seconds = ctx.positive_f32(field, field_name)?
            }
            "wanderTurnMax" => {
                tuning.wander_turn_max_radians = ctx.non_negative_f32(field, field_name)?
            }
            "contactRadius" => tuning.contact_radius = ctx.non_negative_f32(field, field_name)?,
            "damage" => tuning.damage = parse_damage(ctx, field)?,
            "completion" => tuning.completion = parse_completion(ctx, field)?,
            "rewardPoints" => {
                let min = ctx.number_attribute::<u32>(field, "min")?;
                let max = ctx.number_attribute::<u32>(field, "max")?;
                if max <= min {
                    return Err(ctx.error_at(
                        ContentErrorCode::InvalidValue,
                        format!("rewardPoints max ({max}) must be greater than min ({min})"),
                        field,
                    ));
                }
                tuning.reward_points_min = min;
                tuning.reward_points_max = max;
            }
            _ => {
                return Err(ctx.error_at(
                    ContentErrorCode::UnknownField,
                    format!("unknown field <{field_name}> in <LevelDef>"),
                    field,
                ))
            }
        }
    }

    let Some(def_name) = def_name else {
        return Err(ctx.error_at(
            ContentErrorCode::MissingField,
            "missing required field <defName> in <LevelDef>".to_string(),
            node,
        ));
    };
    let Some(label) = label else {
        return Err(ctx.error_at(
            ContentErrorCode::MissingField,
            "missing required field <label> in <LevelDef>".to_string(),
            node,
        ));
    };
    if tuning.fragment_count == 0 {
        return Err(ctx.error_at(
            ContentErrorCode::InvalidValue,
            format!("LevelDef '{def_name}' needs at least one fragment"),
            node,
        ));
    }
    if tuning.guard_count > tuning.fragment_count {
        return Err(ctx.error_at(
            ContentErrorCode::InvalidValue,
            format!(
                "LevelDef '{def_name}' has guardCount {} but only {} fragments to guard",
                tuning.guard_count, tuning.fragment_count
            ),
            node,
        ));
    }

    Ok(LevelArchetype {
        id: LevelDefId(0),
        def_name,
        label,
        tuning,
    })
}

fn parse_damage(
    ctx: &DocContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<DamageModel, ContentCompileError> {
    let model = ctx.required_attribute(node, "model")?;
    match model {
        "Continuous" => {
            let rate = ctx.required_child(node, "ratePerSecond")?;
            Ok(DamageModel::Continuous {
                rate_per_second: ctx.non_negative_f32(rate, "ratePerSecond")?,
            })
        }
        "Cooldown" => {
            let amount = ctx.required_child(node, "amount")?;
            let cooldown = ctx.required_child(node, "cooldownMs")?;
            let cooldown_ms = ctx.number::<u32>(cooldown, "cooldownMs")?;
            Ok(DamageModel::Cooldown {
                amount: ctx.non_negative_f32(amount, "amount")?,
                cooldown_seconds: cooldown_ms as f32 / 1000.0,
            })
        }
        other => Err(ctx.error_at(
            ContentErrorCode::InvalidValue,
            format!(
                "invalid damage model '{other}'; allowed values: Continuous, Cooldown"
            ),
            node,
        )),
    }
}

fn parse_completion(
    ctx: &DocContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<CompletionRule, ContentCompileError> {
    let rule = ctx.required_attribute(node, "rule")?;
    match rule {
        "SpawnChests" => {
            let count_node = ctx.required_child(node, "chestCount")?;
            let count = ctx.number::<u32>(count_node, "chestCount")?;
            if count == 0 {
                return Err(ctx.error_at(
                    ContentErrorCode::InvalidValue,
                    "chestCount must be >= 1 so a winning chest exists".to_string(),
                    count_node,
                ));
            }
            let reach = ctx.required_child(node, "reachRadius")?;
            Ok(CompletionRule::SpawnChests {
                count,
                reach_radius: ctx.positive_f32(reach, "reachRadius")?,
            })
        }
        "Immediate" => Ok(CompletionRule::Immediate),
        other => Err(ctx.error_at(
            ContentErrorCode::InvalidValue,
            format!(
                "invalid completion rule '{other}'; allowed values: SpawnChests, Immediate"
            ),
            node,
        )),
    }
}

struct DocContext<'a, 'input> {
    file_path: &'a Path,
    doc: &'a Document<'input>,
}

impl DocContext<'_, '_> {
    fn error_at(
        &self,
        code: ContentErrorCode,
        message: String,
        node: Node<'_, '_>,
    ) -> ContentCompileError {
        let pos = self.doc.text_pos_at(node.range().start);
        ContentCompileError {
            code,
            message,
            file_path: self.file_path.to_path_buf(),
            location: Some(SourceLocation {
                line: pos.row as usize,
                column: pos.col as usize,
            }),
        }
    }

    fn required_text(
        &self,
        node: Node<'_, '_>,
        field_name: &str,
    ) -> Result<String, ContentCompileError> {
        let value = node.text().map(str::trim).unwrap_or_default().to_string();
        if value.is_empty() {
            return Err(self.error_at(
                ContentErrorCode::MissingField,
                format!("field <{field_name}> must not be empty"),
                node,
            ));
        }
        Ok(value)
    }

    fn required_child<'n, 'input>(
        &self,
        node: Node<'n, 'input>,
        child_name: &str,
    ) -> Result<Node<'n, 'input>, ContentCompileError> {
        node.children()
            .find(|child| child.has_tag_name(child_name))
            .ok_or_else(|| {
                self.error_at(
                    ContentErrorCode::MissingField,
                    format!(
                        "missing required field <{child_name}> in <{}>",
                        node.tag_name().name()
                    ),
                    node,
                )
            })
    }

    fn required_attribute<'n>(
        &self,
        node: Node<'n, '_>,
        attribute: &str,
    ) -> Result<&'n str, ContentCompileError> {
        node.attribute(attribute).ok_or_else(|| {
            self.error_at(
                ContentErrorCode::MissingField,
                format!(
                    "missing required attribute '{attribute}' on <{}>",
                    node.tag_name().name()
                ),
                node,
            )
        })
    }

    fn number<T: FromStr>(
        &self,
        node: Node<'_, '_>,
        field_name: &str,
    ) -> Result<T, ContentCompileError> {
        let value = self.required_text(node, field_name)?;
        value.parse::<T>().map_err(|_| {
            self.error_at(
                ContentErrorCode::InvalidValue,
                format!("{field_name} '{value}' is not a valid number"),
                node,
            )
        })
    }

    fn number_attribute<T: FromStr>(
        &self,
        node: Node<'_, '_>,
        attribute: &str,
    ) -> Result<T, ContentCompileError> {
        let value = self.required_attribute(node, attribute)?;
        value.trim().parse::<T>().map_err(|_| {
            self.error_at(
                ContentErrorCode::InvalidValue,
                format!(
                    "attribute '{attribute}' value '{value}' is not a valid number"
                ),
                node,
            )
        })
    }

    fn non_negative_f32(
        &self,
        node: Node<'_, '_>,
        field_name: &str,
    ) -> Result<f32, ContentCompileError> {
        let parsed = self.number::<f32>(node, field_name)?;
        if !parsed.is_finite() || parsed < 0.0 {
            return Err(self.error_at(
                ContentErrorCode::InvalidValue,
                format!("{field_name} must be finite and >= 0"),
                node,
            ));
        }
        Ok(parsed)
    }

    fn positive_f32(
        &self,
        node: Node<'_, '_>,
        field_name: &str,
    ) -> Result<f32, ContentCompileError> {
        let parsed = self.non_negative_f32(node, field_name)?;
        if parsed == 0.0 {
            return Err(self.error_at(
                ContentErrorCode::InvalidValue,
                format!("{field_name} must be > 0"),
                node,
            ));
        }
        Ok(parsed)
    }
}

struct ReadError {
    path: PathBuf,
    source: std::io::Error,
}

fn collect_xml_files_sorted(root: &Path) -> Result<Vec<PathBuf>, ReadError> {
    let mut files = Vec::<PathBuf>::new();
    collect_recursive(root, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_recursive(current: &Path, files: &mut Vec<PathBuf>) -> Result<(), ReadError> {
    let entries = fs::read_dir(current).map_err(|source| ReadError {
        path: current.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| ReadError {
            path: current.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_recursive(&path, files)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        {
            files.push(path);
        }
    }
    Ok(())
}

fn read_error(path: PathBuf, source: std::io::Error) -> ContentCompileError {
    ContentCompileError {
        code: ContentErrorCode::ReadFile,
        message: format!("failed to read XML content: {source}"),
        file_path: path,
        location: None,
    }
}
