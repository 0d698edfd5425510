fn main() -> std::process::ExitCode {
    patchstack::run()
}
