use tracing::{info, warn};

/// Outcome of comparing the local communication version with the trainer's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionCompatibility {
    Compatible,
    /// Same major version, different minor one.
    MinorMismatch,
    Incompatible,
}

impl VersionCompatibility {
    pub fn is_compatible(self) -> bool {
        self != VersionCompatibility::Incompatible
    }
}

fn parse_major_minor(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().map_or(Some(0), |minor| minor.parse().ok())?;
    Some((major, minor))
}

/// Versions must agree on the major number. A minor difference is logged.
pub fn check_communication_versions(local: &str, trainer: &str) -> VersionCompatibility {
    let (Some((local_major, local_minor)), Some((trainer_major, trainer_minor))) =
        (parse_major_minor(local), parse_major_minor(trainer))
    else {
        warn!("Cannot compare communication versions '{}' and '{}'", local, trainer);
        return VersionCompatibility::Incompatible;
    };

    if local_major != trainer_major {
        return VersionCompatibility::Incompatible;
    }
    if local_minor != trainer_minor {
        info!(
            "Communication versions {} and {} differ in minor version, some features may be unavailable",
            local, trainer
        );
        return VersionCompatibility::MinorMismatch;
    }
    VersionCompatibility::Compatible
}
