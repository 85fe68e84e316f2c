#[actix_web::main]
async fn main() -> std::io::Result<()> {
    resilia_server::run().await
}
