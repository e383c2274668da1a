/// Key layout for the ledger partitions
///
/// - `assets`: asset:{uuid} -> AssetRecord (JSON)
/// - `contacts`: contact:{id} -> Contact (JSON)
/// - `phones`: phone:{normalized number} -> contact id (string)

pub const ASSETS: &str = "assets";
pub const CONTACTS: &str = "contacts";
pub const PHONES: &str = "phones";

/// Encode an asset key: asset:{id}
pub fn encode_asset_key(id: &str) -> Vec<u8> {
    format!("asset:{id}").into_bytes()
}

/// Decode an asset key: asset:{id} -> id
pub fn decode_asset_key(key: &[u8]) -> Option<String> {
    let key_str = std::str::from_utf8(key).ok()?;
    key_str.strip_prefix("asset:").map(String::from)
}

/// Encode a contact key: contact:{id}
pub fn encode_contact_key(id: &str) -> Vec<u8> {
    format!("contact:{id}").into_bytes()
}

/// Encode a phone index key from an already-normalized number
pub fn encode_phone_key(normalized: &str) -> Vec<u8> {
    format!("phone:{normalized}").into_bytes()
}
