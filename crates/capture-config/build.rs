fn main() {
    // Tell cargo to recompile when these compile-time env vars change.
    // Without this, option_env!() values get cached and won't update.
    println!("cargo:rerun-if-env-changed=AHHA_OAUTH_CLIENT_ID");
    println!("cargo:rerun-if-env-changed=AHHA_OAUTH_AUTHORIZATION_URL");
    println!("cargo:rerun-if-env-changed=AHHA_API_BASE_URL");
}
