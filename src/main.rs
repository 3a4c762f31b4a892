fn main() {
    service_hours_lib::run()
}
