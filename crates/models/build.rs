fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Client and server stubs; the server side backs the in-process test service
    tonic_build::compile_protos("../../proto/models.proto")?;
    Ok(())
}
