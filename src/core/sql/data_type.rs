pub const STRING: &str = "STRING";
pub const BIGINT: &str = "BIGINT";

pub fn timestamp(precision: u8) -> String {
    format!("TIMESTAMP({})", precision)
}
