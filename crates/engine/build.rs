// crates/engine/build.rs
fn main() {
    let f = |n| std::env::var(format!("CARGO_FEATURE_{}", n)).is_ok();

    if f("FFI") && !f("C2PA") {
        panic!("feature 'ffi' requires 'c2pa'");
    }
}
