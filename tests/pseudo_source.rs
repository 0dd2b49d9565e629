mod common;

use common::{image, symbol_table, U7Record, FOR_EACH, IF_ELSE, WHILE};
use usecode_dec_rs::{Decompiler, FunctionSelection, Options, OutputModes, UsecodeImage};

fn ucs_of(bytes: &[u8]) -> String {
    let options = Options {
        modes: OutputModes {
            ucs: true,
            ..OutputModes::default()
        },
        ..Options::default()
    };
    let image = UsecodeImage::parse(bytes, &options).unwrap();
    let output = Decompiler::new(&image, &options).run().unwrap();
    assert_eq!(output.report.fallbacks, 0, "{:?}", output.report.diagnostics);
    output.text
}

#[test]
fn if_else_shape() {
    let text = ucs_of(&image(&[U7Record::new(0x401).args(1).locals(1).code(IF_ELSE)]));
    let expected = "#game \"blackgate\"\n\
void Func0401 object#(0x401) (var0000)\n\
{\n\
\tvar var0001;\n\
\n\
\tif (var0000)\n\
\t{\n\
\t\tvar0001 = 1;\n\
\t}\n\
\telse\n\
\t{\n\
\t\tvar0001 = 2;\n\
\t}\n\
\tsay();\n\
}\n\n\n";
    assert_eq!(text, expected);
}

#[test]
fn while_shape() {
    let text = ucs_of(&image(&[U7Record::new(0x401).args(1).code(WHILE)]));
    assert!(text.contains("\twhile (var0000)\n\t{\n\t\tvar0000 = 1;\n\t}\n}\n"));
}

#[test]
fn for_each_shape() {
    let text = ucs_of(&image(&[U7Record::new(0x401).args(1).locals(4).code(FOR_EACH)]));
    assert!(text.contains(
        "\tfor (var0003 in var0000 with var0001 to var0002)\n\t{\n\t\tvar0004 = var0003;\n\t}\n"
    ));
}

#[test]
fn calls_and_strings() {
    // pushs "Hello"; push var0000; call Func0500 (via link 0); ret
    let record = U7Record::new(0x401)
        .args(1)
        .string("Hello")
        .link(0x0500)
        .code(&[0x1d, 0x00, 0x00, 0x21, 0x00, 0x00, 0x24, 0x00, 0x00, 0x25]);
    let callee = U7Record::new(0x500).args(2).code(&[0x25]);
    let text = ucs_of(&image(&[record, callee]));
    assert!(text.contains("\tFunc0500(var0000, \"Hello\");\n"), "{}", text);
    assert!(text.contains("void Func0500 object#(0x500) (var0000, var0001)"));
}

#[test]
fn class_methods_sit_inside_their_class() {
    let mut bytes = symbol_table("Bird", &[0x0A00], 2, 1);
    bytes.extend(image(&[
        U7Record::new(0x401).code(&[0x25]),
        U7Record::new(0xA00).args(1).code(&[0x33, 0x25]),
    ]));
    let text = ucs_of(&bytes);
    assert!(text.starts_with("#game \"blackgate\"\n// Global static variables\nstatic gvar0001;\n\n"));
    let class_at = text.find("class Bird\n{\n\tvar cvar0000;\n\tvar cvar0001;\n").unwrap();
    assert!(text.find("Func0401").unwrap() < class_at);
    assert!(text.ends_with("\tsay();\n}\n}\n\n\n"));
}

#[test]
fn unstructurable_function_falls_back_to_assembly() {
    let options = Options {
        modes: OutputModes {
            ucs: true,
            ..OutputModes::default()
        },
        selection: FunctionSelection::Ids(vec![0x401]),
        ..Options::default()
    };
    // pop with nothing pushed
    let bytes = image(&[U7Record::new(0x401).code(&[0x12, 0x00, 0x00, 0x25])]);
    let image = UsecodeImage::parse(&bytes, &options).unwrap();
    let output = Decompiler::new(&image, &options).run().unwrap();
    assert_eq!(output.report.fallbacks, 1);
    assert!(output.text.contains("// Function 0x0401: pseudo-source unavailable"));
    assert!(output.text.contains(".funcnumber 0x0401\n"));
    assert_eq!(output.report.exit_code(), 0);
}
