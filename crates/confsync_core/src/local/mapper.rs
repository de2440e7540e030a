//! Mapping between objects and their files.
//!
//! Every object has `meta.json` and `description.md`; configs and rows add
//! `config.json`. Transformations store blocks and codes as nested
//! directories, shared code rows keep the script in a code file.

use super::files::{read_json_file, read_text_file, ObjectFile};
use crate::error::{CoreError, CoreResult, MultiError};
use crate::model::{
    join_path, Block, Branch, Code, Component, Config, ConfigRow, Content, Key, Object, Record,
    Relations, Transformation,
};
use crate::naming::{
    NamingTemplate, PathGenerator, BLOCKS_DIR, CODE_FILE_NAME, CONFIG_FILE, DESCRIPTION_FILE,
    META_FILE,
};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;

/// Content key holding a shared code script.
pub const SHARED_CODE_CONTENT_KEY: &str = "code_content";

/// What the mappers need to know besides the object itself.
#[derive(Debug, Clone)]
pub struct MapperContext {
    /// Component of the object (unknown for branches).
    pub component: Option<Component>,
    /// Target component of the parent shared code config, for its rows.
    pub shared_code_target: Option<String>,
    /// Naming templates.
    pub naming: NamingTemplate,
}

impl MapperContext {
    fn is_shared_code_row(&self, object: &Object) -> bool {
        matches!(object, Object::ConfigRow(_))
            && self.component.as_ref().is_some_and(Component::is_shared_code)
    }

    fn code_file_for(&self, component_id: &str) -> String {
        PathGenerator::new(&self.naming).code_file_name(component_id)
    }
}

fn description_text(description: &str) -> String {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}

fn meta_value(name: &str, is_disabled: Option<bool>, relations: Option<&Relations>) -> Value {
    let mut meta = Map::new();
    meta.insert("name".into(), Value::String(name.to_string()));
    if let Some(disabled) = is_disabled {
        meta.insert("isDisabled".into(), Value::Bool(disabled));
    }
    if let Some(relations) = relations {
        let stored = relations.only_stored_locally();
        if !stored.is_empty() {
            meta.insert(
                "relations".into(),
                serde_json::to_value(&stored).unwrap_or(Value::Null),
            );
        }
    }
    Value::Object(meta)
}

/// Files of `object` stored at `object_path`, in write order.
///
/// The first three entries are always `meta.json`, `config.json` (not for
/// branches) and `description.md`.
pub fn object_files(
    object: &Object,
    object_path: &str,
    ctx: &MapperContext,
) -> CoreResult<Vec<ObjectFile>> {
    let file = |name: &str| join_path(object_path, name);
    let mut files = Vec::new();
    match object {
        Object::Branch(b) => {
            files.push(ObjectFile::json(
                file(META_FILE),
                json!({"name": b.name, "isDefault": b.is_default}),
            ));
            files.push(ObjectFile::text(
                file(DESCRIPTION_FILE),
                description_text(&b.description),
            ));
        }
        Object::Config(c) => {
            files.push(ObjectFile::json(
                file(META_FILE),
                meta_value(&c.name, Some(c.is_disabled), Some(&c.relations)),
            ));
            files.push(ObjectFile::json(
                file(CONFIG_FILE),
                Value::Object(c.content.clone()),
            ));
            files.push(ObjectFile::text(
                file(DESCRIPTION_FILE),
                description_text(&c.description),
            ));
            if let Some(t) = &c.transformation {
                files.extend(transformation_files(
                    t,
                    object_path,
                    c.key.component_id.as_str(),
                    ctx,
                ));
            }
        }
        Object::ConfigRow(r) => {
            let mut content = r.content.clone();
            let script = if ctx.is_shared_code_row(object) {
                content.remove(SHARED_CODE_CONTENT_KEY)
            } else {
                None
            };
            files.push(ObjectFile::json(
                file(META_FILE),
                meta_value(&r.name, Some(r.is_disabled), Some(&r.relations)),
            ));
            files.push(ObjectFile::json(file(CONFIG_FILE), Value::Object(content)));
            files.push(ObjectFile::text(
                file(DESCRIPTION_FILE),
                description_text(&r.description),
            ));
            if let Some(script) = script {
                let target = ctx.shared_code_target.as_deref().unwrap_or_default();
                files.push(ObjectFile::text(
                    file(&ctx.code_file_for(target)),
                    script_text(&script),
                ));
            }
        }
    }
    Ok(files)
}

fn script_text(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .collect::<Vec<_>>()
            .join("\n\n"),
        other => other.to_string(),
    };
    format!("{}\n", text.trim_end())
}

fn transformation_files(
    t: &Transformation,
    object_path: &str,
    component_id: &str,
    ctx: &MapperContext,
) -> Vec<ObjectFile> {
    let generator = PathGenerator::new(&ctx.naming);
    let code_file = ctx.code_file_for(component_id);
    let mut files = Vec::new();
    for (bi, block) in t.blocks.iter().enumerate() {
        let block_dir = join_path(
            object_path,
            &block
                .path
                .clone()
                .unwrap_or_else(|| generator.block_path(bi, block)),
        );
        files.push(ObjectFile::json(
            join_path(&block_dir, META_FILE),
            json!({"name": block.name}),
        ));
        for (ci, code) in block.codes.iter().enumerate() {
            let code_dir = join_path(
                &block_dir,
                &code
                    .path
                    .clone()
                    .unwrap_or_else(|| generator.code_path(ci, code)),
            );
            files.push(ObjectFile::json(
                join_path(&code_dir, META_FILE),
                json!({"name": code.name}),
            ));
            files.push(ObjectFile::text(
                join_path(&code_dir, &code_file),
                format!("{}\n", code.script.trim_end()),
            ));
        }
    }
    files
}

/// Outcome of loading one object.
#[derive(Debug)]
pub enum LoadOutcome {
    /// The object was assembled and validated.
    Loaded {
        /// The object.
        object: Object,
        /// Files found, relative to the object path.
        related_paths: Vec<String>,
    },
    /// The object directory does not exist.
    NotFound,
}

/// Loads the object of `record` from the project directory.
///
/// Missing files are fine, a missing directory is [`LoadOutcome::NotFound`].
/// File errors are collected and returned together.
pub fn load_object(root: &Path, record: &Record, ctx: &MapperContext) -> CoreResult<LoadOutcome> {
    let object_path = record.path();
    if !root.join(&object_path).is_dir() {
        return Ok(LoadOutcome::NotFound);
    }

    let mut errors = MultiError::with_prefix(format!(
        "{} \"{}\" is invalid",
        record.key.kind(),
        object_path
    ));
    let mut related = Vec::new();
    let rel = |name: &str| join_path(&object_path, name);

    let meta = match read_json_file(root, &rel(META_FILE)) {
        Ok(Some(m)) => {
            related.push(META_FILE.to_string());
            m
        }
        Ok(None) => Content::new(),
        Err(e) => {
            errors.push(e);
            Content::new()
        }
    };
    let content = if matches!(record.key, Key::Branch(_)) {
        Content::new()
    } else {
        match read_json_file(root, &rel(CONFIG_FILE)) {
            Ok(Some(c)) => {
                related.push(CONFIG_FILE.to_string());
                c
            }
            Ok(None) => Content::new(),
            Err(e) => {
                errors.push(e);
                Content::new()
            }
        }
    };
    let description = match read_text_file(root, &rel(DESCRIPTION_FILE)) {
        Ok(Some(d)) => {
            related.push(DESCRIPTION_FILE.to_string());
            d.trim().to_string()
        }
        Ok(None) => String::new(),
        Err(e) => {
            errors.push(e);
            String::new()
        }
    };

    let name = meta
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let is_disabled = meta
        .get("isDisabled")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let relations: Relations = match meta.get("relations") {
        Some(v) => serde_json::from_value(v.clone()).unwrap_or_else(|e| {
            errors.push(CoreError::invalid_file(rel(META_FILE), e));
            Relations::new()
        }),
        None => Relations::new(),
    };

    let mut object = match &record.key {
        Key::Branch(k) => Object::Branch(Branch {
            key: k.clone(),
            name,
            description,
            is_default: meta
                .get("isDefault")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }),
        Key::Config(k) => Object::Config(Config {
            key: k.clone(),
            name,
            description,
            is_disabled,
            content,
            transformation: None,
            relations,
        }),
        Key::ConfigRow(k) => Object::ConfigRow(ConfigRow {
            key: k.clone(),
            name,
            description,
            is_disabled,
            content,
            relations,
        }),
    };

    if let Object::Config(config) = &mut object {
        if ctx
            .component
            .as_ref()
            .is_some_and(Component::is_transformation)
        {
            let code_file = ctx.code_file_for(config.key.component_id.as_str());
            match load_blocks(root, &object_path, &code_file, &mut related) {
                Ok(t) => config.transformation = Some(t),
                Err(e) => errors.push(e),
            }
        }
    }

    if ctx.is_shared_code_row(&object) {
        let target = ctx.shared_code_target.clone().unwrap_or_default();
        let code_file = ctx.code_file_for(&target);
        match read_text_file(root, &rel(&code_file)) {
            Ok(Some(script)) => {
                related.push(code_file);
                if let Some(content) = object.content_mut() {
                    content.insert(
                        SHARED_CODE_CONTENT_KEY.to_string(),
                        Value::String(script.trim_end().to_string()),
                    );
                }
            }
            Ok(None) => {}
            Err(e) => errors.push(e),
        }
    }

    if let Err(e) = object.validate() {
        errors.push(e);
    }
    errors.into_result()?;
    Ok(LoadOutcome::Loaded {
        object,
        related_paths: related,
    })
}

fn sorted_dirs(dir: &Path) -> CoreResult<Vec<String>> {
    let mut names = Vec::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() && !name.starts_with('.') {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

fn load_blocks(
    root: &Path,
    object_path: &str,
    code_file: &str,
    related: &mut Vec<String>,
) -> CoreResult<Transformation> {
    let blocks_dir = join_path(object_path, BLOCKS_DIR);
    let mut blocks = Vec::new();
    for block_name in sorted_dirs(&root.join(&blocks_dir))? {
        let block_rel = join_path(BLOCKS_DIR, &block_name);
        let block_path = join_path(object_path, &block_rel);
        let meta = read_json_file(root, &join_path(&block_path, META_FILE))?;
        if meta.is_some() {
            related.push(join_path(&block_rel, META_FILE));
        }
        let mut block = Block {
            name: name_from_meta(meta.as_ref(), &block_name),
            codes: Vec::new(),
            path: Some(block_rel.clone()),
        };
        for code_name in sorted_dirs(&root.join(&block_path))? {
            let code_rel = join_path(&block_rel, &code_name);
            let code_path = join_path(object_path, &code_rel);
            let meta = read_json_file(root, &join_path(&code_path, META_FILE))?;
            if meta.is_some() {
                related.push(join_path(&code_rel, META_FILE));
            }
            let script = match find_code_file(&root.join(&code_path), code_file)? {
                Some(file_name) => {
                    let text = read_text_file(root, &join_path(&code_path, &file_name))?
                        .unwrap_or_default();
                    related.push(join_path(&code_rel, &file_name));
                    text.trim_end().to_string()
                }
                None => String::new(),
            };
            block.codes.push(Code {
                name: name_from_meta(meta.as_ref(), &code_name),
                script,
                path: Some(code_name),
            });
        }
        blocks.push(block);
    }
    Ok(Transformation { blocks })
}

fn name_from_meta(meta: Option<&Content>, dir_name: &str) -> String {
    meta.and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| dir_name.to_string())
}

/// The expected code file, else the first `code.*` file of the directory.
fn find_code_file(dir: &Path, expected: &str) -> CoreResult<Option<String>> {
    if dir.join(expected).is_file() {
        return Ok(Some(expected.to_string()));
    }
    let prefix = format!("{CODE_FILE_NAME}.");
    let mut found: Vec<String> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_file() && name.starts_with(&prefix) {
            found.push(name);
        }
    }
    found.sort();
    Ok(found.into_iter().next())
}
