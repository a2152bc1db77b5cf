//! Connection compatibility between a source handle and a target port.

use weft_core::schema::{AcceptSet, InputPort, OutputPort, ANY_TYPE, WILDCARD};

/// Decide whether a source with the given capability/type may connect to a
/// port accepting `accepted_capabilities` / `accepted_types`.
///
/// - An absent source capability or type matches only a `*` accepted set.
/// - A capability matches when the set holds `*` or the exact capability.
/// - A type matches when the set holds `*`, `any`, or the exact type.
/// - A `*` source capability, or a `*`/`any` source type, matches any
///   non-empty accepted set.
///
/// Both capability and type must match.
pub fn is_compatible(
    source_capability: Option<&str>,
    source_type: Option<&str>,
    accepted_capabilities: &AcceptSet,
    accepted_types: &AcceptSet,
) -> bool {
    capability_matches(source_capability, accepted_capabilities)
        && type_matches(source_type, accepted_types)
}

fn capability_matches(capability: Option<&str>, accepted: &AcceptSet) -> bool {
    match capability {
        None => accepted.is_wildcard(),
        Some(WILDCARD) => !accepted.is_empty(),
        Some(cap) => accepted.is_wildcard() || accepted.contains(cap),
    }
}

fn type_matches(data_type: Option<&str>, accepted: &AcceptSet) -> bool {
    match data_type {
        None => accepted.is_wildcard(),
        Some(WILDCARD) | Some(ANY_TYPE) => !accepted.is_empty(),
        Some(t) => accepted.accepts_any_type() || accepted.contains(t),
    }
}

/// Port-level convenience over `is_compatible`.
pub fn ports_compatible(output: &OutputPort, input: &InputPort) -> bool {
    is_compatible(
        output.capability.as_deref(),
        output.data_type.as_deref(),
        &input.capabilities,
        &input.types,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> AcceptSet {
        AcceptSet::new(items.iter().copied())
    }

    #[test]
    fn test_wildcard_capability() {
        assert!(is_compatible(Some("agent"), Some("str"), &set(&["*"]), &set(&["str"])));
    }

    #[test]
    fn test_capability_mismatch() {
        assert!(!is_compatible(Some("agent"), Some("str"), &set(&["tool"]), &set(&["str"])));
    }

    #[test]
    fn test_type_rules() {
        let caps = set(&["agent"]);
        assert!(is_compatible(Some("agent"), Some("str"), &caps, &set(&["any"])));
        assert!(is_compatible(Some("agent"), Some("str"), &caps, &set(&["*"])));
        assert!(is_compatible(Some("agent"), Some("str"), &caps, &set(&["int", "str"])));
        assert!(!is_compatible(Some("agent"), Some("str"), &caps, &set(&["callable"])));
    }

    #[test]
    fn test_wildcard_source() {
        assert!(is_compatible(Some("*"), Some("any"), &set(&["tool"]), &set(&["callable"])));
        assert!(is_compatible(Some("*"), Some("*"), &set(&["prompt"]), &set(&["str"])));
        // A wildcard source still needs something to match against.
        assert!(!is_compatible(Some("*"), Some("any"), &set(&[]), &set(&["str"])));
    }

    #[test]
    fn test_absent_sides() {
        assert!(is_compatible(None, Some("str"), &set(&["*"]), &set(&["str"])));
        assert!(!is_compatible(None, Some("str"), &set(&["agent"]), &set(&["str"])));
        assert!(is_compatible(Some("agent"), None, &set(&["agent"]), &set(&["*"])));
        // `any` is not enough for an undeclared type.
        assert!(!is_compatible(Some("agent"), None, &set(&["agent"]), &set(&["any"])));
        assert!(!is_compatible(Some("agent"), Some("str"), &set(&[]), &set(&["str"])));
    }

    #[test]
    fn test_wildcard_symmetry_exhaustive() {
        let caps = ["agent", "tool", "prompt", "*"];
        let types = ["str", "callable", "any", "*"];
        for cap in caps {
            for ty in types {
                assert!(is_compatible(Some(cap), Some(ty), &set(&["*"]), &set(&["*"])));
            }
        }
    }

    #[test]
    fn test_ports_compatible() {
        let out = OutputPort::new("out", "tool", "callable");
        let tools = InputPort::new("tools", &["tool"], &["callable"]);
        let system = InputPort::new("system", &["prompt"], &["str"]);
        assert!(ports_compatible(&out, &tools));
        assert!(!ports_compatible(&out, &system));
    }
}
