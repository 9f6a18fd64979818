//! Identifier minting for Pokémon UIDs, playthroughs and custom locations.
//! Format: `<prefix>_<millis base36>_<random base36>`, e.g. `pk_lx2k9d1c_3f9a0zq1`.

pub const UID_PREFIX: &str = "pk";
pub const PLAYTHROUGH_PREFIX: &str = "playthrough";
pub const CUSTOM_LOCATION_PREFIX: &str = "custom";

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const RANDOM_SUFFIX_LEN: usize = 8;

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

fn random_suffix() -> String {
    let mut entropy: u64 = rand::random();
    let mut out = String::with_capacity(RANDOM_SUFFIX_LEN);
    for _ in 0..RANDOM_SUFFIX_LEN {
        out.push(char::from(BASE36[(entropy % 36) as usize]));
        entropy /= 36;
    }
    out
}

fn mint(prefix: &str, now_millis: i64) -> String {
    let stamp = to_base36(now_millis.max(0).unsigned_abs());
    format!("{prefix}_{stamp}_{}", random_suffix())
}

#[must_use]
pub fn new_uid(now_millis: i64) -> String {
    mint(UID_PREFIX, now_millis)
}

#[must_use]
pub fn new_playthrough_id(now_millis: i64) -> String {
    mint(PLAYTHROUGH_PREFIX, now_millis)
}

#[must_use]
pub fn new_custom_location_id(now_millis: i64) -> String {
    mint(CUSTOM_LOCATION_PREFIX, now_millis)
}

/// True when the id was minted for a user-added location.
#[must_use]
pub fn is_custom_location_id(id: &str) -> bool {
    id.strip_prefix(CUSTOM_LOCATION_PREFIX)
        .is_some_and(|rest| rest.starts_with('_'))
}
