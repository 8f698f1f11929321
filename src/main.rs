fn main() {
    if let Err(err) = drive_tables::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
