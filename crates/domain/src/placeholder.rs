//! Placeholder expansion.
//!
//! A target list may name a domain group (`"lights"`, `"fans"`, ...) instead
//! of concrete entities. Expansion swaps each token for the issuing device's
//! own list for that domain, in place. Literal identifiers pass through;
//! nothing is deduplicated.

use crate::action::{ActionCall, ActionSpec, Target};
use crate::device::{Domain, EntityGroups};

/// Expand one target list.
#[must_use]
pub fn expand_targets(targets: &[String], entities: &EntityGroups) -> Vec<String> {
    let mut expanded = Vec::with_capacity(targets.len());
    for target in targets {
        match Domain::from_placeholder(target) {
            Some(domain) => expanded.extend(entities.get(domain).iter().cloned()),
            None => expanded.push(target.clone()),
        }
    }
    expanded
}

/// Expand every call of `spec` against `entities`.
#[must_use]
pub fn expand(spec: &ActionSpec, entities: &EntityGroups) -> ActionSpec {
    spec.iter()
        .map(|call| ActionCall {
            target: Target {
                entity_id: expand_targets(call.targets(), entities),
            },
            ..call.clone()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups() -> EntityGroups {
        EntityGroups {
            lights: vec!["light.a".into(), "light.b".into()],
            fans: vec!["fan.ceiling".into()],
            ..EntityGroups::default()
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn should_expand_token_and_keep_literal_in_written_order() {
        let expanded = expand_targets(&strings(&["lights", "light.extra"]), &groups());
        assert_eq!(expanded, strings(&["light.a", "light.b", "light.extra"]));
    }

    #[test]
    fn should_not_deduplicate_repeated_entities() {
        let expanded = expand_targets(&strings(&["light.a", "lights", "lights"]), &groups());
        assert_eq!(
            expanded,
            strings(&["light.a", "light.a", "light.b", "light.a", "light.b"])
        );
    }

    #[test]
    fn should_expand_token_of_unpopulated_domain_to_nothing() {
        let expanded = expand_targets(&strings(&["covers", "cover.garage"]), &groups());
        assert_eq!(expanded, strings(&["cover.garage"]));
    }

    #[test]
    fn should_leave_near_miss_tokens_untouched() {
        let expanded = expand_targets(&strings(&["light", "Lights"]), &groups());
        assert_eq!(expanded, strings(&["light", "Lights"]));
    }

    #[test]
    fn should_expand_every_call_and_keep_data() {
        let spec = ActionSpec::new(vec![
            ActionCall::new("fan.set_direction", ["fans"]).with_data("direction", "reverse"),
            ActionCall::new("light.turn_off", ["lights"]),
        ]);
        let expanded = expand(&spec, &groups());
        assert_eq!(expanded.calls()[0].targets(), ["fan.ceiling"]);
        assert_eq!(expanded.calls()[0].data["direction"], "reverse");
        assert_eq!(expanded.calls()[1].targets(), ["light.a", "light.b"]);
    }
}
