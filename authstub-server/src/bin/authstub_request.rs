//! CLI tool for building encrypted stub requests
//!
//! Signs a claims JSON with an EC private key and encrypts the result to the
//! stub's RSA public key, printing the compact JWE.
//!
//! # Usage
//!
//! ```bash
//! # Reverification request for the identity proofing stub
//! authstub-request --claims @request.json --signing-key @ipv_private.pem \
//!     --encryption-key @rsa_public.pem --kid ipv-1
//!
//! # Client assertion with an embedded access token, as a curl command
//! authstub-request --claims @assertion.json --signing-key @client.pem \
//!     --access-token @token.json --access-token-signing-key @auth.pem \
//!     --encryption-key @rsa_public.pem --output curl
//! ```

use authstub_credential::{sign_jws, Algorithm};
use authstub_crypto::{encrypt, ContentEncryption, EncryptionKey};
use authstub_server::config::load_key_material;
use clap::{Parser, ValueEnum};
use serde_json::{json, Value as JsonValue};
use std::time::{SystemTime, UNIX_EPOCH};

/// Build encrypted request objects for the authentication stubs
#[derive(Parser, Debug)]
#[command(name = "authstub-request")]
#[command(about = "Sign and encrypt a request object for the authentication stubs")]
struct Args {
    /// Claims JSON (inline or @filepath)
    #[arg(long, required = true)]
    claims: String,

    /// EC private key in PKCS#8 PEM (inline or @filepath)
    #[arg(long, required = true)]
    signing_key: String,

    /// RSA public key the envelope is encrypted to (inline or @filepath)
    #[arg(long, required = true)]
    encryption_key: String,

    /// `typ` header of the signed request
    #[arg(long, default_value = "JWT")]
    typ: String,

    /// `kid` header of the signed request
    #[arg(long)]
    kid: Option<String>,

    /// Access token claims JSON to sign and embed as `access_token`
    #[arg(long, requires = "access_token_signing_key")]
    access_token: Option<String>,

    /// EC private key for the embedded access token
    #[arg(long)]
    access_token_signing_key: Option<String>,

    /// Stamp `iat` and `exp` with this lifetime (e.g. "5m", "1h")
    #[arg(long)]
    expires_in: Option<String>,

    /// Content encryption algorithm
    #[arg(long, default_value = "a256gcm", value_enum)]
    enc: Enc,

    /// Endpoint used by `--output curl`
    #[arg(long, default_value = "http://localhost:8080/amc/authorize")]
    url: String,

    /// Output format
    #[arg(long, default_value = "token", value_enum)]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Enc {
    A256gcm,
    A128gcm,
}

impl From<Enc> for ContentEncryption {
    fn from(enc: Enc) -> Self {
        match enc {
            Enc::A256gcm => ContentEncryption::A256Gcm,
            Enc::A128gcm => ContentEncryption::A128Gcm,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Just the compact JWE
    Token,
    /// JSON object with the JWE, the signed request and its claims
    Json,
    /// Ready-to-use curl command
    Curl,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut claims = load_json(&args.claims)?;
    if let Some(ref lifetime) = args.expires_in {
        stamp_lifetime(&mut claims, parse_duration(lifetime)?)?;
    }

    if let Some(ref access_token) = args.access_token {
        let key = args
            .access_token_signing_key
            .as_deref()
            .ok_or("--access-token requires --access-token-signing-key")?;
        let mut token_claims = load_json(access_token)?;
        if let Some(ref lifetime) = args.expires_in {
            stamp_lifetime(&mut token_claims, parse_duration(lifetime)?)?;
        }
        let token = sign_jws(
            &token_claims,
            &load_key_material(key)?,
            Algorithm::ES256,
            Some("at+jwt"),
            None,
        )?;
        claims["access_token"] = json!(token);
    }

    let signed = sign_jws(
        &claims,
        &load_key_material(&args.signing_key)?,
        Algorithm::ES256,
        Some(&args.typ),
        args.kid.as_deref(),
    )?;
    let recipient = EncryptionKey::from_pem(&load_key_material(&args.encryption_key)?)?;
    let envelope = encrypt(signed.as_bytes(), &recipient, args.enc.into())?;

    match args.output {
        OutputFormat::Token => {
            println!("{}", envelope);
        }
        OutputFormat::Json => {
            let output = json!({
                "request": envelope,
                "signed": signed,
                "claims": claims,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Curl => {
            println!(r#"curl "{}?request={}""#, args.url, envelope);
        }
    }

    Ok(())
}

/// Load a JSON object from inline text or @filepath
fn load_json(input: &str) -> Result<JsonValue, Box<dyn std::error::Error>> {
    let text = load_key_material(input)
        .map_err(|e| format!("Failed to read '{}': {}", input, e))?;
    let value: JsonValue = serde_json::from_str(&text)?;
    if !value.is_object() {
        return Err("Claims must be a JSON object".into());
    }
    Ok(value)
}

/// Set `iat` to now and `exp` to now + `lifetime` seconds
fn stamp_lifetime(claims: &mut JsonValue, lifetime: u64) -> Result<(), Box<dyn std::error::Error>> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    claims["iat"] = json!(now);
    claims["exp"] = json!(now + lifetime);
    Ok(())
}

/// Parse duration string (e.g., "30s", "5m", "1h")
fn parse_duration(s: &str) -> Result<u64, Box<dyn std::error::Error>> {
    let s = s.trim().to_lowercase();

    if let Ok(secs) = s.parse::<u64>() {
        return Ok(secs);
    }

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('s') {
        (n, 1u64)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60u64)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 3600u64)
    } else if let Some(n) = s.strip_suffix('d') {
        (n, 86400u64)
    } else {
        return Err(format!("Invalid duration '{}'. Use format like 30s, 5m, 1h, 1d", s).into());
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("Invalid duration number in '{}'", s))?;

    Ok(num * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use authstub_credential::peek_header;
    use authstub_crypto::{decrypt_to_string, DecryptionKey};

    const CLIENT_PRIVATE: &str = include_str!("../../tests/fixtures/client_assertion_private.pem");
    const RSA_PRIVATE: &str = include_str!("../../tests/fixtures/rsa_private.pem");
    const RSA_PUBLIC: &str = include_str!("../../tests/fixtures/rsa_public.pem");

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s").unwrap(), 30);
        assert_eq!(parse_duration("5m").unwrap(), 300);
        assert_eq!(parse_duration("1h").unwrap(), 3600);
        assert_eq!(parse_duration("1d").unwrap(), 86400);
        assert_eq!(parse_duration("600").unwrap(), 600);
        assert!(parse_duration("1y").is_err());
    }

    #[test]
    fn test_load_json_rejects_non_object() {
        assert!(load_json(r#"{"sub":"x"}"#).is_ok());
        assert!(load_json("[1,2]").is_err());
        assert!(load_json("not json").is_err());
    }

    #[test]
    fn test_stamp_lifetime() {
        let mut claims = json!({"sub": "x"});
        stamp_lifetime(&mut claims, 300).unwrap();
        let iat = claims["iat"].as_u64().unwrap();
        assert_eq!(claims["exp"].as_u64().unwrap(), iat + 300);
    }

    #[tokio::test]
    async fn test_signed_request_opens_with_matching_key() {
        let signed = sign_jws(
            &json!({"sub": "x"}),
            CLIENT_PRIVATE,
            Algorithm::ES256,
            Some("JWT"),
            Some("kid-1"),
        )
        .unwrap();
        let recipient = EncryptionKey::from_pem(RSA_PUBLIC).unwrap();
        let envelope = encrypt(signed.as_bytes(), &recipient, Enc::A128gcm.into()).unwrap();

        let key = DecryptionKey::from_pem(RSA_PRIVATE).unwrap();
        let opened = decrypt_to_string(&envelope, &key).await.unwrap();
        assert_eq!(opened, signed);
        assert_eq!(peek_header(&opened).unwrap().kid.as_deref(), Some("kid-1"));
    }
}
