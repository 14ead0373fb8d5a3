//! Messages of the `parker_server.Parker/Lookup` RPC.
//!
//! Only the fields a lookup sends are modelled on the response; prost skips the rest.

pub(crate) const LOOKUP_PATH: &str = "/parker_server.Parker/Lookup";

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Partition {
    #[prost(string, tag = "1")]
    pub partition_key: String,
    #[prost(string, tag = "2")]
    pub partition_value: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Key {
    #[prost(oneof = "key::Kind", tags = "1, 2, 3, 4")]
    pub kind: Option<key::Kind>,
}

pub mod key {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Kind {
        #[prost(int32, tag = "1")]
        Int32Value(i32),
        #[prost(int64, tag = "2")]
        Int64Value(i64),
        #[prost(bytes = "vec", tag = "3")]
        BytesValue(Vec<u8>),
        #[prost(string, tag = "4")]
        StringValue(String),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LookupRequest {
    #[prost(string, tag = "1")]
    pub account: String,
    #[prost(string, tag = "2")]
    pub table: String,
    #[prost(message, repeated, tag = "3")]
    pub partitions: Vec<Partition>,
    #[prost(message, optional, tag = "4")]
    pub key: Option<Key>,
    #[prost(string, tag = "5")]
    pub key_column: String,
    #[prost(int64, tag = "6")]
    pub snapshot: i64,
    #[prost(string, repeated, tag = "10")]
    pub columns: Vec<String>,
}

impl LookupRequest {
    pub fn string_key(account: &str, table: &str, key: &str) -> Self {
        Self {
            account: account.to_string(),
            table: table.to_string(),
            key: Some(Key {
                kind: Some(key::Kind::StringValue(key.to_string())),
            }),
            ..Default::default()
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LookupResponse {
    #[prost(int64, tag = "1")]
    pub snapshot: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn string_key_wire_format() {
        let request = LookupRequest::string_key("a", "t", "k1");
        let bytes = request.encode_to_vec();

        // account(1), table(2), key(4) { string_value(4) }
        assert_eq!(
            bytes,
            vec![0x0a, 1, b'a', 0x12, 1, b't', 0x22, 4, 0x22, 2, b'k', b'1']
        );
        assert_eq!(LookupRequest::decode(bytes.as_slice()).unwrap(), request);
    }

    #[test]
    fn response_ignores_record() {
        // snapshot = 7, followed by a record message (field 2) we don't model.
        let bytes = [0x08, 7, 0x12, 2, 0x0a, 0];
        let response = LookupResponse::decode(&bytes[..]).unwrap();
        assert_eq!(response.snapshot, 7);
    }
}
