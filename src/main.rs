fn main() -> anyhow::Result<()> {
    acuvera_lib::run()
}
