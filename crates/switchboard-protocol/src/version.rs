//! Protocol versioning for safe upgrades.

/// Current protocol version carried in every client frame's `v` field.
pub const PROTOCOL_VERSION: u16 = 1;

/// Versions this relay will accept at attach time.
///
/// Kept as an explicit list so a transitional release can accept the
/// previous version while clients roll over.
pub const SUPPORTED_VERSIONS: &[u16] = &[PROTOCOL_VERSION];

/// Returns true if the given client version is accepted by this relay.
pub fn is_supported(version: u16) -> bool {
    SUPPORTED_VERSIONS.contains(&version)
}
