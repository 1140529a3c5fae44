fn main() -> Result<(), Box<dyn std::error::Error>> {
    // protox compiles the proto without a system protoc.
    let file_descriptors = protox::compile(["proto/vrf.proto"], ["proto"])?;
    tonic_build::configure().compile_fds(file_descriptors)?;

    println!("cargo:rerun-if-changed=proto/vrf.proto");
    Ok(())
}
