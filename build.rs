fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "grpc")]
    {
        println!("cargo:rerun-if-changed=proto/pvz/v1/pvz.proto");

        tonic_build::configure()
            .build_server(true)
            .build_client(true)
            .compile_protos(&["proto/pvz/v1/pvz.proto"], &["proto"])?;
    }
    Ok(())
}
