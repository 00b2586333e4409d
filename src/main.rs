fn main() {
    pyl_cli::cli::run();
}
