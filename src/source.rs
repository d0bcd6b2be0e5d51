//! Text <-> tree boundary used by hosts that hand over source text.

use std::path::Path;

use swc_core::{
    common::{comments::SingleThreadedComments, sync::Lrc, FileName, SourceMap},
    ecma::{
        ast::Module,
        codegen::{text_writer::JsWriter, Config, Emitter},
        parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax, TsSyntax},
    },
};

use crate::error::{Result, TrackingError};

/// Source map and comments of a parsed file; needed to print it again and
/// to resolve line numbers.
pub struct SourceContext {
    pub source_map: Lrc<SourceMap>,
    pub comments: SingleThreadedComments,
}

fn syntax_for(file_path: &str) -> Syntax {
    let ext = Path::new(file_path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    match ext {
        "ts" | "mts" | "cts" | "tsx" => Syntax::Typescript(TsSyntax {
            tsx: ext == "tsx",
            ..Default::default()
        }),
        _ => Syntax::Es(EsSyntax {
            jsx: true,
            ..Default::default()
        }),
    }
}

/// Parse `source` as a module. Recovered parser errors count as failures
/// too: a tree the parser had to patch up is not rewritten.
pub fn parse_module(source: &str, file_path: &str) -> Result<(Module, SourceContext)> {
    let source_map: Lrc<SourceMap> = Default::default();
    let comments = SingleThreadedComments::default();
    let fm = source_map.new_source_file(
        Lrc::new(FileName::Custom(file_path.to_string())),
        source.to_string(),
    );
    let (parsed, recovered) = {
        let lexer = Lexer::new(
            syntax_for(file_path),
            Default::default(),
            StringInput::from(&*fm),
            Some(&comments),
        );
        let mut parser = Parser::new_from(lexer);
        let parsed = parser.parse_module();
        (parsed, parser.take_errors())
    };

    let module = parsed.map_err(|err| TrackingError::Parse {
        file: file_path.to_string(),
        message: format!("{:?}", err.kind()),
    })?;
    if let Some(first) = recovered.first() {
        return Err(TrackingError::Parse {
            file: file_path.to_string(),
            message: format!("{:?}", first.kind()),
        });
    }

    Ok((
        module,
        SourceContext {
            source_map,
            comments,
        },
    ))
}

impl SourceContext {
    /// Print `module` back to source text, keeping the comments collected at
    /// parse time.
    pub fn print_module(&self, module: &Module, file_path: &str) -> Result<String> {
        print_module(self, module, file_path)
    }
}

fn print_module(cx: &SourceContext, module: &Module, file_path: &str) -> Result<String> {
    let mut buf = Vec::new();
    {
        let writer = JsWriter::new(cx.source_map.clone(), "\n", &mut buf, None);
        let mut emitter = Emitter {
            cfg: Config::default(),
            cm: cx.source_map.clone(),
            comments: Some(&cx.comments),
            wr: writer,
        };
        emitter.emit_module(module).map_err(|source| TrackingError::Emit {
            file: file_path.to_string(),
            source,
        })?;
    }
    String::from_utf8(buf).map_err(|e| TrackingError::Emit {
        file: file_path.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    })
}

/// Print synthesized statements as a module body, for assertions.
#[cfg(test)]
pub(crate) fn print_stmts(stmts: Vec<swc_core::ecma::ast::Stmt>) -> String {
    use swc_core::ecma::ast::ModuleItem;

    let (_, cx) = parse_module("", "synthesized.js").unwrap();
    let module = Module {
        span: swc_core::common::DUMMY_SP,
        body: stmts.into_iter().map(ModuleItem::Stmt).collect(),
        shebang: None,
    };
    cx.print_module(&module, "synthesized.js").unwrap()
}
