//! Checksum skill - digests a string with a named algorithm

use super::{Skill, SkillContext, SkillOutput};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use std::fmt::Write;

pub struct ChecksumSkill;

#[derive(Debug, Deserialize)]
struct ChecksumInput {
    data: String,
    format: String,
    algorithm: String,
}

fn digest(algorithm: &str, data: &[u8]) -> Option<Vec<u8>> {
    match algorithm {
        "md5" => Some(Md5::digest(data).to_vec()),
        "sha1" => Some(Sha1::digest(data).to_vec()),
        "sha256" => Some(Sha256::digest(data).to_vec()),
        "sha512" => Some(Sha512::digest(data).to_vec()),
        _ => None,
    }
}

fn encode(format: &str, bytes: &[u8]) -> Result<String, String> {
    match format {
        "hex" => Ok(bytes.iter().fold(String::new(), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })),
        "base64" => Ok(base64::engine::general_purpose::STANDARD.encode(bytes)),
        other => Err(format!("Unknown encoding: {other}")),
    }
}

#[async_trait]
impl Skill for ChecksumSkill {
    fn name(&self) -> &'static str {
        "Checksum"
    }

    fn description(&self) -> String {
        "Calculate the checksum of a string. Supported algorithms: md5, sha1, sha256, sha512. Supported formats: hex, base64.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["data", "format", "algorithm"],
            "properties": {
                "data": {
                    "type": "string",
                    "description": "The data to calculate the checksum of"
                },
                "format": {
                    "type": "string",
                    "description": "The format of the checksum, accepted values are hex and base64"
                },
                "algorithm": {
                    "type": "string",
                    "description": "The algorithm to use, accepted values are md5, sha1, sha256 and sha512"
                }
            }
        })
    }

    async fn process(&self, input: Value, _ctx: SkillContext) -> SkillOutput {
        let input: ChecksumInput = match serde_json::from_value(input) {
            Ok(i) => i,
            Err(e) => return SkillOutput::error(format!("Invalid input: {e}")),
        };
        tracing::debug!(algorithm = %input.algorithm, format = %input.format, "Checksum");

        let Some(bytes) = digest(&input.algorithm, input.data.as_bytes()) else {
            tracing::debug!(algorithm = %input.algorithm, "Algorithm not supported");
            return SkillOutput {
                value: json!({
                    "result": "",
                    "error": format!("Algorithm {} not supported", input.algorithm)
                }),
                is_error: true,
            };
        };

        match encode(&input.format, &bytes) {
            Ok(result) => SkillOutput::ok(json!({ "result": result })),
            Err(e) => SkillOutput {
                value: json!({
                    "result": "",
                    "error": format!("Error calculating checksum: {e}")
                }),
                is_error: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_context() -> SkillContext {
        SkillContext::new("test-agent", reqwest::Client::new())
    }

    async fn run(input: Value) -> SkillOutput {
        ChecksumSkill.process(input, test_context()).await
    }

    #[tokio::test]
    async fn test_sha256_hex() {
        let output = run(json!({"data": "abc", "format": "hex", "algorithm": "sha256"})).await;
        assert_eq!(
            output.value,
            json!({"result": "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"})
        );
    }

    #[tokio::test]
    async fn test_sha256_base64() {
        let output = run(json!({"data": "abc", "format": "base64", "algorithm": "sha256"})).await;
        assert_eq!(
            output.value,
            json!({"result": "ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0="})
        );
    }

    #[tokio::test]
    async fn test_sha512_hex_prefix() {
        let output = run(json!({"data": "abc", "format": "hex", "algorithm": "sha512"})).await;
        let result = output.value["result"].as_str().unwrap();
        assert_eq!(result.len(), 128);
        assert!(result.starts_with("ddaf35a193617abacc417349ae204131"));
    }

    #[tokio::test]
    async fn test_md5_and_sha1_hex() {
        let md5 = run(json!({"data": "abc", "format": "hex", "algorithm": "md5"})).await;
        assert_eq!(md5.value, json!({"result": "900150983cd24fb0d6963f7d28e17f72"}));

        let sha1 = run(json!({"data": "abc", "format": "hex", "algorithm": "sha1"})).await;
        assert_eq!(
            sha1.value,
            json!({"result": "a9993e364706816aba3e25717850c26c9cd0d89d"})
        );
    }

    #[tokio::test]
    async fn test_unsupported_algorithm() {
        let output = run(json!({"data": "abc", "format": "hex", "algorithm": "crc32"})).await;
        assert!(output.is_error);
        assert_eq!(output.value["error"], "Algorithm crc32 not supported");
        assert_eq!(output.value["result"], "");
    }

    #[tokio::test]
    async fn test_unknown_format() {
        let output = run(json!({"data": "abc", "format": "binary", "algorithm": "sha256"})).await;
        assert!(output.is_error);
        assert_eq!(
            output.value["error"],
            "Error calculating checksum: Unknown encoding: binary"
        );
    }
}
