//! Synthesized manifest XML and class-file bytes for tests.

use std::io::{Cursor, Write};

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::manifest::ANDROID_NS;
use crate::opcodes;

/// A manifest with one `application` element; `name` controls the
/// `android:name` attribute.
pub(crate) fn manifest_with_application(name: Option<&str>) -> String {
    let name_attribute = name
        .map(|value| format!(" android:name=\"{value}\""))
        .unwrap_or_default();
    format!(
        "<manifest xmlns:android=\"{ANDROID_NS}\" package=\"com.example\">\n  \
         <application{name_attribute} android:label=\"Example\">\n    \
         <activity android:name=\".MainActivity\" />\n  \
         </application>\n\
         </manifest>\n"
    )
}

/// A manifest whose only `application` tag sits in a non-default namespace.
pub(crate) fn manifest_with_namespaced_application() -> String {
    format!(
        "<manifest xmlns:android=\"{ANDROID_NS}\" xmlns:tools=\"urn:example:tools\" \
         package=\"com.example\">\n  \
         <tools:application android:name=\"com.example.App\" />\n\
         </manifest>\n"
    )
}

/// A manifest with two `application` elements, in document order.
pub(crate) fn manifest_with_two_applications(first: Option<&str>, second: Option<&str>) -> String {
    let attribute = |name: Option<&str>| {
        name.map(|value| format!(" android:name=\"{value}\""))
            .unwrap_or_default()
    };
    format!(
        "<manifest xmlns:android=\"{ANDROID_NS}\" package=\"com.example\">\n  \
         <application{} />\n  \
         <application{} />\n\
         </manifest>\n",
        attribute(first),
        attribute(second)
    )
}

/// Bytecode statement for a synthesized method body.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Op {
    Nop,
    ALoad0,
    Return,
    InvokeVirtual(&'static str, &'static str, &'static str),
    InvokeSpecial(&'static str, &'static str, &'static str),
    InvokeStatic(&'static str, &'static str, &'static str),
}

pub(crate) struct MethodDef {
    pub(crate) name: &'static str,
    pub(crate) descriptor: &'static str,
    pub(crate) body: Vec<Op>,
}

pub(crate) fn on_create(body: Vec<Op>) -> MethodDef {
    MethodDef {
        name: "onCreate",
        descriptor: "()V",
        body,
    }
}

/// The remediation call every happy-path fixture needs.
pub(crate) fn apply_call() -> Op {
    Op::InvokeStatic("org/zakky/prngfix/PRNGFixes", "apply", "()V")
}

/// Serialize a minimal well-formed class file with the given methods.
///
/// Every method is public and carries a Code attribute; callers are
/// responsible for ending each body with a return instruction.
pub(crate) fn class_bytes(internal_name: &str, methods: &[MethodDef]) -> Vec<u8> {
    let mut pool = ConstantPool::default();
    let this_index = pool.class(internal_name);
    let super_index = pool.class("java/lang/Object");
    let code_attribute_name = pool.utf8("Code");

    let mut encoded_methods = Vec::new();
    for method in methods {
        let name_index = pool.utf8(method.name);
        let descriptor_index = pool.utf8(method.descriptor);
        let code = encode_body(&mut pool, &method.body);
        encoded_methods.push((name_index, descriptor_index, code));
    }

    let mut out = Vec::new();
    out.extend_from_slice(&0xCAFE_BABE_u32.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes()); // minor version
    out.extend_from_slice(&50u16.to_be_bytes()); // major version: Java 6
    pool.write(&mut out);
    out.extend_from_slice(&0x0021u16.to_be_bytes()); // ACC_PUBLIC | ACC_SUPER
    out.extend_from_slice(&this_index.to_be_bytes());
    out.extend_from_slice(&super_index.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes()); // interfaces
    out.extend_from_slice(&0u16.to_be_bytes()); // fields
    out.extend_from_slice(&(encoded_methods.len() as u16).to_be_bytes());
    for (name_index, descriptor_index, code) in encoded_methods {
        out.extend_from_slice(&0x0001u16.to_be_bytes()); // ACC_PUBLIC
        out.extend_from_slice(&name_index.to_be_bytes());
        out.extend_from_slice(&descriptor_index.to_be_bytes());
        out.extend_from_slice(&1u16.to_be_bytes()); // one attribute: Code
        out.extend_from_slice(&code_attribute_name.to_be_bytes());
        let attribute_length = (12 + code.len()) as u32;
        out.extend_from_slice(&attribute_length.to_be_bytes());
        out.extend_from_slice(&4u16.to_be_bytes()); // max_stack
        out.extend_from_slice(&4u16.to_be_bytes()); // max_locals
        out.extend_from_slice(&(code.len() as u32).to_be_bytes());
        out.extend_from_slice(&code);
        out.extend_from_slice(&0u16.to_be_bytes()); // exception table
        out.extend_from_slice(&0u16.to_be_bytes()); // code attributes
    }
    out.extend_from_slice(&0u16.to_be_bytes()); // class attributes
    out
}

/// Package class files into an in-memory JAR.
pub(crate) fn jar_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start jar entry");
        writer.write_all(data).expect("write jar entry");
    }
    writer.finish().expect("finish jar").into_inner()
}

fn encode_body(pool: &mut ConstantPool, body: &[Op]) -> Vec<u8> {
    let mut code = Vec::new();
    for op in body {
        match op {
            Op::Nop => code.push(opcodes::NOP),
            Op::ALoad0 => code.push(opcodes::ALOAD_0),
            Op::Return => code.push(opcodes::RETURN),
            Op::InvokeVirtual(owner, name, descriptor) => {
                encode_invoke(pool, &mut code, opcodes::INVOKEVIRTUAL, owner, name, descriptor);
            }
            Op::InvokeSpecial(owner, name, descriptor) => {
                encode_invoke(pool, &mut code, opcodes::INVOKESPECIAL, owner, name, descriptor);
            }
            Op::InvokeStatic(owner, name, descriptor) => {
                encode_invoke(pool, &mut code, opcodes::INVOKESTATIC, owner, name, descriptor);
            }
        }
    }
    code
}

fn encode_invoke(
    pool: &mut ConstantPool,
    code: &mut Vec<u8>,
    opcode: u8,
    owner: &str,
    name: &str,
    descriptor: &str,
) {
    let index = pool.method_ref(owner, name, descriptor);
    code.push(opcode);
    code.extend_from_slice(&index.to_be_bytes());
}

/// Deduplicating constant-pool builder; indices are 1-based.
#[derive(Default)]
struct ConstantPool {
    entries: Vec<Vec<u8>>,
}

impl ConstantPool {
    fn push(&mut self, entry: Vec<u8>) -> u16 {
        if let Some(position) = self.entries.iter().position(|existing| *existing == entry) {
            return (position + 1) as u16;
        }
        self.entries.push(entry);
        self.entries.len() as u16
    }

    fn utf8(&mut self, value: &str) -> u16 {
        let mut entry = vec![1u8];
        entry.extend_from_slice(&(value.len() as u16).to_be_bytes());
        entry.extend_from_slice(value.as_bytes());
        self.push(entry)
    }

    fn class(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        let mut entry = vec![7u8];
        entry.extend_from_slice(&name_index.to_be_bytes());
        self.push(entry)
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        let mut entry = vec![12u8];
        entry.extend_from_slice(&name_index.to_be_bytes());
        entry.extend_from_slice(&descriptor_index.to_be_bytes());
        self.push(entry)
    }

    fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(owner);
        let name_and_type_index = self.name_and_type(name, descriptor);
        let mut entry = vec![10u8];
        entry.extend_from_slice(&class_index.to_be_bytes());
        entry.extend_from_slice(&name_and_type_index.to_be_bytes());
        self.push(entry)
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&((self.entries.len() + 1) as u16).to_be_bytes());
        for entry in &self.entries {
            out.extend_from_slice(entry);
        }
    }
}
