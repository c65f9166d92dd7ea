use crate::*;

fn run_driver(source: &str, opts: Opt) -> Option<String> {
    let mut diag = DiagnosticEmitter::log_to_buffer();
    process_source(source, &mut diag, &opts)?;
    Some(diag.out_buffer().unwrap() + &diag.err_buffer().unwrap())
}

#[test]
fn clean_program_is_silent() {
    let source = r"class Point {
  int x;
  constructor(int a) {
    this.x = a;
  }
  int getX() {
    return this.x;
  }
}
";
    let output = run_driver(source, Opt::default()).unwrap();
    assert_eq!(output, "");
}

#[test]
fn warnings_are_printed() {
    let source = r"class A {
  void f() {
    int x = 1;
  }
}
";
    let expected = "[line 3] warning unused-variable: 'x' is never read.\n";
    let output = run_driver(source, Opt::default()).unwrap();
    assert_eq!(output, expected);
}

#[test]
fn errors_fail_the_run() {
    let source = r"class A {
  int f(int y) {
    return y / 0;
  }
}
";
    assert!(run_driver(source, Opt::default()).is_none());
}

#[test]
fn parse_errors_fail_the_run() {
    let source = "class A {\n  void f() {\n    x = 5;\n  }\n}\n";
    assert!(run_driver(source, Opt::default()).is_none());
}

#[test]
fn model_dump() {
    let source = r"class Empty {
}
";
    let opts = Opt {
        dump_model: true,
        ..Opt::default()
    };
    let output = run_driver(source, opts).unwrap();
    assert_eq!(output, source);
}

#[test]
fn summary_dump() {
    let source = r"class Point {
  int x;
  constructor(int a) {
    this.x = a;
  }
  int getX() {
    return this.x;
  }
}
";
    let expected = r"class Point: immutable = recursively-immutable
  field x: modified = not-modified, final = final
  method constructor: modified = modified, independent = not-involved
    param a: modified = not-modified, independent = not-involved
  method getX: modified = not-modified, independent = not-involved
";
    let opts = Opt::parse_from(["kava-driver", "--summary", "source"].iter());
    let output = run_driver(source, opts).unwrap();
    assert_eq!(output, expected);
}
