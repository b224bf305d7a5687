fn main() {
    std::process::exit(installer_lib::run());
}
