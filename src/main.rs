fn main() {
    dotenvy::dotenv().ok();
    crypto_collector::cli::run();
}
