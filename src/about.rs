pub const MORPHOLANG_DISPLAY_VERSION: &str = env!("MORPHOLANG_DISPLAY_VERSION");
pub const MORPHOLANG_BUILD_N: &str = env!("MORPHOLANG_BUILD_N");

pub fn version_cli_text() -> String {
    format!(
        "MorphoLang {}\nBuild {}\nBioelectric protocol compiler",
        MORPHOLANG_DISPLAY_VERSION, MORPHOLANG_BUILD_N
    )
}
