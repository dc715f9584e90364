use crate::domain::model::LimitPolicy;

/// Caps a requested intensity at the policy ceiling.
///
/// Only SHOCK intensities go through here; other effects are forwarded as
/// requested.
pub fn clamp(requested: u8, policy: &LimitPolicy) -> u8 {
    if policy.is_unrestricted() {
        requested
    } else {
        requested.min(policy.max_intensity)
    }
}

/// [`clamp`] plus an audit record whenever the value actually changes.
pub fn clamp_audited(target_id: &str, requested: u8, policy: &LimitPolicy) -> u8 {
    let effective = clamp(requested, policy);
    if effective != requested {
        tracing::warn!(
            target_id = %target_id,
            requested,
            effective,
            max_intensity = policy.max_intensity,
            "Shock intensity clamped"
        );
    }
    effective
}
