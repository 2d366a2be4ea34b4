fn main() {
    if let Err(err) = csv_fieldmap::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
