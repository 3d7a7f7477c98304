/// Static compile/run recipe for one judged language. `None` compile means
/// the source runs directly (interpreted languages).
pub struct LanguageSpec {
    pub source_filename: &'static str,
    pub compile: Option<&'static [&'static str]>,
    pub run: &'static [&'static str],
}

/// Looks up the fixed language -> recipe mapping (spec.md Sandbox Runner
/// table). Returns `None` for anything outside the closed set, which the
/// caller turns into `Verdict::UnsupportedLanguage` without touching the
/// filesystem or spawning a process.
pub fn lookup(language: &str) -> Option<LanguageSpec> {
    match language.to_lowercase().as_str() {
        "cpp" => Some(LanguageSpec {
            source_filename: "Main.cpp",
            compile: Some(&["g++", "Main.cpp", "-o", "Main"]),
            run: &["./Main"],
        }),
        "java" => Some(LanguageSpec {
            source_filename: "Main.java",
            compile: Some(&["javac", "Main.java"]),
            // run command is rebuilt by the caller to inject -Xmx{M}m
            run: &["java", "-cp", ".", "Main"],
        }),
        "python" => Some(LanguageSpec {
            source_filename: "Main.py",
            compile: None,
            run: &["python3", "Main.py"],
        }),
        "javascript" => Some(LanguageSpec {
            source_filename: "Main.js",
            compile: None,
            run: &["node", "Main.js"],
        }),
        _ => None,
    }
}

pub fn is_java(language: &str) -> bool {
    language.eq_ignore_ascii_case("java")
}
