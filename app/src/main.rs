fn main() {
    if let Err(e) = app_lib::run() {
        log::error!("{:#}", e);
        eprintln!("错误: {:#}", e);
        std::process::exit(1);
    }
}
