fn main() {
    ironform::run();
}
