fn main() {
    if let Err(err) = his_migrate::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
