pub fn run() {
    let config = super::load_config();
    println!("{}", config.summary());
    println!("\n✅ Configuration is valid");
}
