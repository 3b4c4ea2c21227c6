use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use jclassfile::class_file;
use serde_json::Value;
use serde_sarif::sarif::{Artifact, ArtifactLocation, ArtifactRoles};
use zip::ZipArchive;

use crate::ir::{CallKind, CallSite, Class, Instruction, InstructionKind, Method};
use crate::opcodes;

/// Lower every class reachable from the given roots, in deterministic order.
///
/// Each root is a directory, a JAR archive, or a single `.class` file. One
/// SARIF artifact is appended per scanned file; JAR entries are parented to
/// their archive's artifact.
pub(crate) fn scan_class_roots(
    roots: &[PathBuf],
    artifacts: &mut Vec<Artifact>,
) -> Result<Vec<Class>> {
    let mut sorted_roots = roots.to_vec();
    sorted_roots.sort_by(|a, b| path_key(a).cmp(&path_key(b)));

    let mut classes = Vec::new();
    for root in sorted_roots {
        if !root.exists() {
            anyhow::bail!("class root not found: {}", root.display());
        }
        scan_path(&root, true, artifacts, &mut classes)?;
    }
    Ok(classes)
}

/// Record the manifest in the artifact table as the analysis target.
pub(crate) fn manifest_artifact(path: &Path, len: u64, artifacts: &mut Vec<Artifact>) -> i64 {
    let roles = vec![
        serde_json::to_value(ArtifactRoles::AnalysisTarget).expect("serialize artifact role"),
    ];
    push_artifact(path_to_uri(path), len, None, Some(roles), artifacts)
}

fn scan_path(
    path: &Path,
    strict: bool,
    artifacts: &mut Vec<Artifact>,
    classes: &mut Vec<Class>,
) -> Result<()> {
    if path.is_dir() {
        return scan_dir(path, artifacts, classes);
    }

    let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");
    match extension {
        "class" => scan_class_file(path, artifacts, classes),
        "jar" => scan_jar_file(path, artifacts, classes),
        _ => {
            if strict {
                anyhow::bail!("unsupported class root: {}", path.display())
            } else {
                Ok(())
            }
        }
    }
}

fn scan_dir(path: &Path, artifacts: &mut Vec<Artifact>, classes: &mut Vec<Class>) -> Result<()> {
    let mut entries = Vec::new();
    for entry in
        fs::read_dir(path).with_context(|| format!("failed to read directory {}", path.display()))?
    {
        let entry =
            entry.with_context(|| format!("failed to read entry under {}", path.display()))?;
        entries.push(entry.path());
    }

    entries.sort_by(|a, b| path_key(a).cmp(&path_key(b)));

    for entry in entries {
        if entry.is_dir() {
            scan_dir(&entry, artifacts, classes)?;
        } else {
            scan_path(&entry, false, artifacts, classes)?;
        }
    }

    Ok(())
}

fn scan_class_file(
    path: &Path,
    artifacts: &mut Vec<Artifact>,
    classes: &mut Vec<Class>,
) -> Result<()> {
    if path_key(path).ends_with("module-info.class") {
        return Ok(());
    }
    let data = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let uri = path_to_uri(path);
    let artifact_index = push_artifact(uri.clone(), data.len() as u64, None, None, artifacts);
    classes.push(lower_class(&data, artifact_index, &uri)?);
    Ok(())
}

fn scan_jar_file(
    path: &Path,
    artifacts: &mut Vec<Artifact>,
    classes: &mut Vec<Class>,
) -> Result<()> {
    let file = fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut archive =
        ZipArchive::new(file).with_context(|| format!("failed to read {}", path.display()))?;

    let jar_len = fs::metadata(path)
        .with_context(|| format!("failed to read {}", path.display()))?
        .len();
    let jar_index = push_artifact(path_to_uri(path), jar_len, None, None, artifacts);

    let mut entry_names = Vec::new();
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if name.ends_with(".class") && !name.ends_with("module-info.class") {
            entry_names.push(name);
        }
    }

    entry_names.sort();

    for name in entry_names {
        let mut entry = archive
            .by_name(&name)
            .with_context(|| format!("failed to read {}:{}", path.display(), name))?;
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .with_context(|| format!("failed to read {}:{}", path.display(), name))?;

        let entry_uri = jar_entry_uri(path, &name);
        let artifact_index = push_artifact(
            entry_uri.clone(),
            entry.size(),
            Some(jar_index),
            None,
            artifacts,
        );
        classes.push(lower_class(&data, artifact_index, &entry_uri)?);
    }

    Ok(())
}

/// Validate one class file and lower it into the analysis IR.
pub(crate) fn lower_class(data: &[u8], artifact_index: i64, origin: &str) -> Result<Class> {
    class_file::parse(data).with_context(|| format!("failed to parse {origin}"))?;
    decode_class(data, artifact_index).with_context(|| format!("failed to decode {origin}"))
}

/// Constant-pool entries the lowering needs; everything else is skipped.
#[derive(Clone, Debug)]
enum Constant {
    Unused,
    Utf8(String),
    Class(u16),
    NameAndType(u16, u16),
    MethodRef(u16, u16),
}

fn decode_class(data: &[u8], artifact_index: i64) -> Result<Class> {
    if read_u32(data, 0)? != 0xCAFE_BABE {
        anyhow::bail!("not a class file");
    }

    let constant_count = read_u16(data, 8)? as usize;
    let mut pool = vec![Constant::Unused; constant_count];
    let mut pos = 10;
    let mut index = 1;
    while index < constant_count {
        let tag = read_u8(data, pos)?;
        pos += 1;
        match tag {
            1 => {
                let len = read_u16(data, pos)? as usize;
                let bytes = slice(data, pos + 2, len)?;
                pool[index] = Constant::Utf8(String::from_utf8_lossy(bytes).into_owned());
                pos += 2 + len;
            }
            7 => {
                pool[index] = Constant::Class(read_u16(data, pos)?);
                pos += 2;
            }
            10 | 11 => {
                pool[index] = Constant::MethodRef(read_u16(data, pos)?, read_u16(data, pos + 2)?);
                pos += 4;
            }
            12 => {
                pool[index] = Constant::NameAndType(read_u16(data, pos)?, read_u16(data, pos + 2)?);
                pos += 4;
            }
            8 | 16 | 19 | 20 => pos += 2,
            15 => pos += 3,
            3 | 4 | 9 | 17 | 18 => pos += 4,
            5 | 6 => {
                // Long and double constants occupy two pool slots.
                pos += 8;
                index += 1;
            }
            _ => anyhow::bail!("unknown constant pool tag {tag}"),
        }
        index += 1;
    }

    // access_flags, this_class, super_class
    let this_class = read_u16(data, pos + 2)?;
    let name = class_name(&pool, this_class)?;
    pos += 6;

    let interface_count = read_u16(data, pos)? as usize;
    pos += 2 + interface_count * 2;

    let field_count = read_u16(data, pos)?;
    pos += 2;
    for _ in 0..field_count {
        pos = skip_member(data, pos)?;
    }

    let method_count = read_u16(data, pos)?;
    pos += 2;
    let mut methods = Vec::with_capacity(method_count as usize);
    for _ in 0..method_count {
        let method_name = utf8(&pool, read_u16(data, pos + 2)?)?;
        let descriptor = utf8(&pool, read_u16(data, pos + 4)?)?;
        let attribute_count = read_u16(data, pos + 6)?;
        pos += 8;

        let mut instructions = Vec::new();
        for _ in 0..attribute_count {
            let attribute_name = utf8(&pool, read_u16(data, pos)?)?;
            let attribute_length = read_u32(data, pos + 2)? as usize;
            if attribute_name == "Code" {
                // attribute body: max_stack(2), max_locals(2), code_length(4), code
                let code_length = read_u32(data, pos + 10)? as usize;
                let code = slice(data, pos + 14, code_length)?;
                instructions = decode_instructions(code, &pool)?;
            }
            pos += 6 + attribute_length;
        }

        methods.push(Method {
            name: method_name,
            descriptor,
            instructions,
        });
    }

    Ok(Class {
        name,
        methods,
        artifact_index,
    })
}

fn skip_member(data: &[u8], mut pos: usize) -> Result<usize> {
    // access_flags, name_index, descriptor_index
    let attribute_count = read_u16(data, pos + 6)?;
    pos += 8;
    for _ in 0..attribute_count {
        let attribute_length = read_u32(data, pos + 2)? as usize;
        pos += 6 + attribute_length;
    }
    Ok(pos)
}

/// Walk a Code array in offset order, turning invoke opcodes into call sites.
///
/// `invokedynamic` carries no owning class and stays an opaque instruction.
fn decode_instructions(code: &[u8], pool: &[Constant]) -> Result<Vec<Instruction>> {
    let mut instructions = Vec::new();
    let mut offset = 0usize;
    while offset < code.len() {
        let opcode = code[offset];
        let kind = match opcode {
            opcodes::INVOKEVIRTUAL
            | opcodes::INVOKESPECIAL
            | opcodes::INVOKESTATIC
            | opcodes::INVOKEINTERFACE => {
                let index = read_u16(code, offset + 1)?;
                InstructionKind::Invoke(call_site(pool, index, call_kind(opcode))?)
            }
            _ => InstructionKind::Other(opcode),
        };
        instructions.push(Instruction {
            offset: offset as u32,
            kind,
        });
        offset += opcode_length(code, offset)?;
    }
    Ok(instructions)
}

fn call_kind(opcode: u8) -> CallKind {
    match opcode {
        opcodes::INVOKESPECIAL => CallKind::Special,
        opcodes::INVOKESTATIC => CallKind::Static,
        opcodes::INVOKEINTERFACE => CallKind::Interface,
        _ => CallKind::Virtual,
    }
}

fn call_site(pool: &[Constant], index: u16, kind: CallKind) -> Result<CallSite> {
    let Some(Constant::MethodRef(class_index, name_and_type_index)) = pool.get(index as usize)
    else {
        anyhow::bail!("constant {index} is not a method reference");
    };
    let Some(Constant::NameAndType(name_index, descriptor_index)) =
        pool.get(*name_and_type_index as usize)
    else {
        anyhow::bail!("constant {name_and_type_index} is not a name-and-type");
    };
    Ok(CallSite {
        owner: class_name(pool, *class_index)?,
        name: utf8(pool, *name_index)?,
        descriptor: utf8(pool, *descriptor_index)?,
        kind,
    })
}

fn class_name(pool: &[Constant], index: u16) -> Result<String> {
    let Some(Constant::Class(name_index)) = pool.get(index as usize) else {
        anyhow::bail!("constant {index} is not a class");
    };
    utf8(pool, *name_index)
}

fn utf8(pool: &[Constant], index: u16) -> Result<String> {
    let Some(Constant::Utf8(value)) = pool.get(index as usize) else {
        anyhow::bail!("constant {index} is not a UTF-8 string");
    };
    Ok(value.clone())
}

/// Length in bytes of the instruction at `offset`, including its opcode.
pub(crate) fn opcode_length(code: &[u8], offset: usize) -> Result<usize> {
    let opcode = code[offset];
    if let Some(length) = opcodes::fixed_length(opcode) {
        return Ok(length);
    }
    match opcode {
        opcodes::TABLESWITCH => {
            let base = offset + 1 + padding(offset);
            let low = read_i32(code, base + 4)?;
            let high = read_i32(code, base + 8)?;
            let count = high
                .checked_sub(low)
                .and_then(|value| value.checked_add(1))
                .filter(|value| *value > 0)
                .with_context(|| format!("invalid tableswitch range {low}..{high}"))?;
            Ok(base - offset + 12 + 4 * count as usize)
        }
        opcodes::LOOKUPSWITCH => {
            let base = offset + 1 + padding(offset);
            let npairs = read_i32(code, base + 4)?;
            let npairs = usize::try_from(npairs)
                .with_context(|| format!("invalid lookupswitch pair count {npairs}"))?;
            Ok(base - offset + 8 + 8 * npairs)
        }
        opcodes::WIDE => {
            let wide_opcode = read_u8(code, offset + 1)?;
            if wide_opcode == opcodes::IINC {
                Ok(6)
            } else {
                Ok(4)
            }
        }
        _ => anyhow::bail!("unknown opcode 0x{opcode:02x} at offset {offset}"),
    }
}

/// Alignment padding after a tableswitch/lookupswitch opcode.
pub(crate) fn padding(offset: usize) -> usize {
    (4 - ((offset + 1) % 4)) % 4
}

fn read_u8(data: &[u8], offset: usize) -> Result<u8> {
    data.get(offset)
        .copied()
        .with_context(|| format!("truncated class data at offset {offset}"))
}

pub(crate) fn read_u16(data: &[u8], offset: usize) -> Result<u16> {
    let bytes = slice(data, offset, 2)?;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

pub(crate) fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    let bytes = slice(data, offset, 4)?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_i32(data: &[u8], offset: usize) -> Result<i32> {
    Ok(read_u32(data, offset)? as i32)
}

fn slice(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    data.get(offset..offset + len)
        .with_context(|| format!("truncated class data at offset {offset}"))
}

fn push_artifact(
    uri: String,
    len: u64,
    parent_index: Option<i64>,
    roles: Option<Vec<Value>>,
    artifacts: &mut Vec<Artifact>,
) -> i64 {
    let location = ArtifactLocation::builder().uri(uri).build();
    let artifact = match (parent_index, roles) {
        (Some(parent_index), Some(roles)) => Artifact::builder()
            .location(location)
            .length(len as i64)
            .parent_index(parent_index)
            .roles(roles)
            .build(),
        (Some(parent_index), None) => Artifact::builder()
            .location(location)
            .length(len as i64)
            .parent_index(parent_index)
            .build(),
        (None, Some(roles)) => Artifact::builder()
            .location(location)
            .length(len as i64)
            .roles(roles)
            .build(),
        (None, None) => Artifact::builder()
            .location(location)
            .length(len as i64)
            .build(),
    };
    let index = artifacts.len() as i64;
    artifacts.push(artifact);
    index
}

pub(crate) fn path_to_uri(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn jar_entry_uri(jar_path: &Path, entry_name: &str) -> String {
    format!("jar:{}!/{}", jar_path.to_string_lossy(), entry_name)
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
