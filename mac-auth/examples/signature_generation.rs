//! MAC header generation and verification.
//!
//! Signs a request with a key taken from the environment, prints the canonical string
//! and `Authorization` header, then verifies the header as a server would.
//!
//! # Running this example
//!
//! ```bash
//! export MAC_KEY=my-issued-mac-key
//! cargo run --example signature_generation
//! ```

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::uninlined_format_args,
    reason = "examples are allowed to use println and simple formatting"
)]

use std::env;

use mac_auth::mac::{MacAuthorization, MacSigner, SignatureParams, SigningInput, canonical_string};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mac_key = env::var("MAC_KEY").map_err(|_| {
        "MAC_KEY environment variable not set.\nSet it with: export MAC_KEY=<issued mac_key>"
    })?;
    let host = "api.stackmob.com";

    let signer = MacSigner::new("example-access-token", mac_key.as_bytes(), host);

    // Fixed values make the output reproducible; omit them to get a fresh ts/nonce.
    let params = SignatureParams::fixed("1361294600", "n0123456789");
    let auth = signer.authorize("PUT", "/user/bob", params)?;

    let input = SigningInput {
        timestamp: &auth.ts,
        nonce: &auth.nonce,
        method: "PUT",
        request_uri: "/user/bob",
        host,
        port: None,
    };
    println!("Canonical string: {:?}", canonical_string(&input));
    println!("Authorization: {}", auth);

    let received: MacAuthorization = auth.to_string().parse()?;
    match received.verify("PUT", "/user/bob", host, None, mac_key.as_bytes()) {
        Ok(()) => println!("✓ Signature verified"),
        Err(e) => eprintln!("✗ Verification failed: {}", e),
    }

    let tampered = received.verify("PUT", "/user/alice", host, None, mac_key.as_bytes());
    println!("Tampered URI rejected: {}", tampered.is_err());

    Ok(())
}
