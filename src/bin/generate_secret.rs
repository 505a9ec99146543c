use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;

fn random_key() -> [u8; 32] {
    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

fn main() {
    println!("🔐 Site Assistant Secret Generator");
    println!("==================================");

    // 256-bit keys; JWT secret in base64, the HMAC keys in hex
    let jwt_secret = STANDARD.encode(random_key());
    let nonce_secret = hex::encode(random_key());
    let signing_secret = hex::encode(random_key());

    println!();
    println!("📝 Copy these lines to your .env file:");
    println!("JWT_SECRET={}", jwt_secret);
    println!("NONCE_SECRET={}", nonce_secret);
    println!("RELAY_SIGNING_SECRET={}", signing_secret);
    println!();
    println!("RELAY_SIGNING_SECRET must match the secret configured on the AI backend.");
    println!("✅ These keys are cryptographically secure and suitable for production use.");
}
