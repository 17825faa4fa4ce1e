fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/");

    // The library builds without protoc; only the gRPC surface needs codegen.
    if std::env::var_os("CARGO_FEATURE_GRPC").is_none() {
        return Ok(());
    }

    let out_dir = std::path::PathBuf::from(std::env::var("OUT_DIR")?);

    // Compile proto files with file descriptor for reflection
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .out_dir("src/proto")
        .file_descriptor_set_path(out_dir.join("market_descriptor.bin"))
        .compile_protos(
            &[
                "proto/common.proto",
                "proto/taxonomy.proto",
                "proto/moderation.proto",
                "proto/reports.proto",
                "proto/users.proto",
                "proto/health.proto",
            ],
            &["proto"],
        )?;

    Ok(())
}
