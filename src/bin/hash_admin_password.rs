use bcrypt::{hash, DEFAULT_COST};
use std::io::{self, Write};

const MIN_PASSWORD_LEN: usize = 10;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🛡️  Site Assistant - Admin Password");
    println!("==========================================");

    print!("Password: ");
    io::stdout().flush()?;
    let password = rpassword::read_password()?;

    if password.chars().count() < MIN_PASSWORD_LEN {
        eprintln!("❌ Password must be at least {} characters long", MIN_PASSWORD_LEN);
        std::process::exit(1);
    }

    print!("Password (again): ");
    io::stdout().flush()?;
    let password_confirm = rpassword::read_password()?;

    if password != password_confirm {
        eprintln!("❌ Passwords don't match");
        std::process::exit(1);
    }

    let password_hash = hash(&password, DEFAULT_COST)?;

    println!();
    println!("✅ Password hashed.");
    println!("📝 Add this line to your .env file (single quotes keep the $ signs intact):");
    println!("ADMIN_PASSWORD_HASH='{}'", password_hash);
    println!();
    println!("🌐 Then sign in at http://localhost:3000/admin");

    Ok(())
}
