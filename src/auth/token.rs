use rand::Rng;

/// Generates an opaque 32-character hex token id (128 bits of entropy)
///
/// The id doubles as the public capture URL segment, so it must be
/// unguessable; ids are never reused.
pub fn generate_token_id() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    hex::encode(bytes)
}

/// Validates token id format (32 lowercase hex chars)
pub fn is_valid_token_id(token: &str) -> bool {
    token.len() == 32
        && token
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_uppercase())
}
