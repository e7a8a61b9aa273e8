fn main() {
    // Only the firmware build links against ESP-IDF; host builds (tests, replay)
    // have no sysenv to forward.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::espidf::sysenv::output();
    }
}
