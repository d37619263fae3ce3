use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use protolite::{
    check_compatibility, parse_schema, DynamicMessage, Message, PlaybackFile, PlaybackHeader,
    Schema, PLAYBACK_SCHEMA,
};
use protolite_config::{load_schema_files, ToolConfig};

/// Encode the sample playback record to `path`, read it back and print it
pub fn demo(path: &Path, out: &mut impl Write) -> Result<()> {
    let file = PlaybackFile::new(PlaybackHeader::new(1010, 1.234, 5.678), "hello world");
    let bytes = file.encode_to_vec();
    fs::write(path, &bytes).with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(path = %path.display(), len = bytes.len(), "wrote playback file");

    let read = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let decoded = PlaybackFile::decode(&read)
        .with_context(|| format!("decoding {}", path.display()))?;

    writeln!(
        out,
        "Read: {} {} {:.6} {:.6}",
        decoded.header().magic(),
        String::from_utf8_lossy(decoded.body()),
        decoded.header().testfloat(),
        decoded.header().testdouble()
    )?;
    Ok(())
}

/// Decode `file` against a schema and print the dump.
///
/// Schema precedence: `--schema` files, then the config's `[schema]` paths,
/// then the bundled playback schema. The root message is `--message`, then
/// the config's `root`, then the last message declared.
pub fn inspect(
    file: &Path,
    schema_paths: &[PathBuf],
    message: Option<&str>,
    config: &ToolConfig,
    out: &mut impl Write,
) -> Result<()> {
    let schema = resolve_schema(schema_paths, config)?;
    let root = match message.or(config.schema.root.as_deref()) {
        Some(name) => name.to_string(),
        None => match schema.messages().last() {
            Some(last) => last.name.clone(),
            None => bail!("schema declares no messages"),
        },
    };

    let bytes = fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    tracing::debug!(file = %file.display(), len = bytes.len(), root = %root, "inspecting");

    let decoded = DynamicMessage::decode_with(&schema, &root, &bytes, &config.decode.to_options())
        .with_context(|| format!("decoding {} as {root}", file.display()))?;
    write!(out, "{decoded}")?;
    Ok(())
}

/// Print the compatibility report; returns whether the schemas are compatible
pub fn check_compat(old: &Path, new: &Path, out: &mut impl Write) -> Result<bool> {
    let old_schema = load_schema_files(&[old])?;
    let new_schema = load_schema_files(&[new])?;
    let report = check_compatibility(&old_schema, &new_schema);

    writeln!(out, "{}", report.level)?;
    for issue in &report.issues {
        writeln!(out, "  error: {issue}")?;
    }
    for warning in &report.warnings {
        writeln!(out, "  warning: {warning}")?;
    }
    Ok(report.is_compatible())
}

fn resolve_schema(schema_paths: &[PathBuf], config: &ToolConfig) -> Result<Schema> {
    if !schema_paths.is_empty() {
        return Ok(load_schema_files(schema_paths)?);
    }
    if let Some(schema) = config.load_schema()? {
        return Ok(schema);
    }
    Ok(parse_schema(PLAYBACK_SCHEMA)?)
}
