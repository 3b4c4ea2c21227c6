use crate::ir::{CallSite, Instruction, InstructionKind, Method};

/// Return the first element satisfying the predicate, scanning in sequence order.
pub(crate) fn find_first<T>(items: &[T], predicate: impl Fn(&T) -> bool) -> Option<&T> {
    items.iter().find(|item| predicate(item))
}

/// Find a method by its exact (name, descriptor) identity.
pub(crate) fn find_method<'a>(
    methods: &'a [Method],
    name: &str,
    descriptor: &str,
) -> Option<&'a Method> {
    find_first(methods, |method| {
        method.name == name && method.descriptor == descriptor
    })
}

/// Find the first call to (owner, name, descriptor); non-call instructions are skipped.
pub(crate) fn find_method_call<'a>(
    instructions: &'a [Instruction],
    owner: &str,
    name: &str,
    descriptor: &str,
) -> Option<&'a CallSite> {
    instructions.iter().find_map(|instruction| match &instruction.kind {
        InstructionKind::Invoke(call)
            if call.owner == owner && call.name == name && call.descriptor == descriptor =>
        {
            Some(call)
        }
        _ => None,
    })
}
