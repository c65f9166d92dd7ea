use super::test_utils::parse_string;

fn parse_error(source: &str) -> String {
    parse_string(source).expect_err("expected a frontend error")
}

#[test]
fn parse_empty_class() -> Result<(), String> {
    let source = "class Empty {\n}\n";
    let unit = parse_string(source)?;
    assert_eq!(unit.print(), source);
    Ok(())
}

#[test]
fn parse_fields_and_methods() -> Result<(), String> {
    let source = r#"class Point {
  int x;
  int y;
  constructor(int a, int b) {
    this.x = a;
    this.y = b;
  }
  int getX() {
    return this.x;
  }
}
"#;
    let unit = parse_string(source)?;
    assert_eq!(unit.print(), source);
    Ok(())
}

#[test]
fn parse_control_flow() -> Result<(), String> {
    let source = r#"class Flow {
  int count(list<int> xs) {
    int total = 0;
    for (int x : xs) {
      total = total + x;
    }
    while (total > 10) {
      total = total - 1;
    }
    if (total == 0) {
      return total;
    } else {
      return -total;
    }
  }
}
"#;
    let unit = parse_string(source)?;
    assert_eq!(unit.print(), source);
    Ok(())
}

#[test]
fn parse_expressions() -> Result<(), String> {
    let source = r#"class Exprs {
  list<int> build(bool flag) {
    list<int> xs = [1, 2, 3];
    xs.add(flag ? 4 : 5);
    bool has = xs.contains(4) && !xs.isEmpty();
    if (has) {
      return xs;
    }
    return [0];
  }
}
"#;
    let unit = parse_string(source)?;
    assert_eq!(unit.print(), source);
    Ok(())
}

#[test]
fn parse_empty_list_literal() -> Result<(), String> {
    let source = r#"class A {
  list<int> drain(list<int> xs) {
    xs = [];
    return [];
  }
}
"#;
    let unit = parse_string(source)?;
    assert_eq!(unit.print(), source);
    Ok(())
}

#[test]
fn parse_multiple_classes() -> Result<(), String> {
    let source = r#"class Pair {
  int first;
  constructor(int first) {
    this.first = first;
  }
}
class Factory {
  Pair make(int v) {
    Pair p = new Pair(v);
    return p;
  }
}
"#;
    let unit = parse_string(source)?;
    assert_eq!(unit.print(), source);
    Ok(())
}

#[test]
fn parse_strings_and_throw() -> Result<(), String> {
    let source = r#"class Guard {
  bool sealed;
  void seal() {
    if (this.sealed) {
      throw "already sealed";
    }
    this.sealed = true;
  }
}
"#;
    let unit = parse_string(source)?;
    assert_eq!(unit.print(), source);
    Ok(())
}

#[test]
fn parse_error_undefined_variable() {
    let output = parse_error("class A {\n  void f() {\n    x = 5;\n  }\n}\n");
    assert_eq!(
        output,
        "[line 3] Error at 'id_2': Undefined variable 'x'.\n"
    );
}

#[test]
fn parse_error_return_type_mismatch() {
    let output = parse_error("class A {\n  int f() {\n    return true;\n  }\n}\n");
    assert_eq!(
        output,
        "[line 3] Error at 'return': 'int' type expected; 'bool' found.\n"
    );
}

#[test]
fn parse_error_shadowing() {
    let output = parse_error("class A {\n  void f(int x) {\n    int x = 1;\n  }\n}\n");
    assert_eq!(
        output,
        "[line 3] Error at 'id_2': Variable 'x' shadows an existing variable.\n"
    );
}

#[test]
fn parse_error_void_field() {
    let output = parse_error("class A {\n  void broken;\n}\n");
    assert_eq!(
        output,
        "[line 2] Error at 'id_1': Fields cannot have type 'void'.\n"
    );
}

#[test]
fn parse_error_missing_return_value() {
    let output = parse_error("class A {\n  int f() {\n    return;\n  }\n}\n");
    assert_eq!(
        output,
        "[line 3] Error at 'return': Non-void methods must return a value.\n"
    );
}

#[test]
fn parse_error_unknown_class() {
    let output = parse_error("class A {\n  B field;\n}\n");
    assert_eq!(output, "[line 2] Error at 'id_1': Unknown type 'B'.\n");
}

#[test]
fn parse_error_wrong_arity() {
    let output = parse_error(
        "class A {\n  int f(int x) {\n    return x;\n  }\n  void g() {\n    this.f(1, 2);\n  }\n}\n",
    );
    assert_eq!(output, "[line 6] Error at '.': 1 arguments expected, got 2.\n");
}

#[test]
fn parse_error_invalid_assignment_target() {
    let output = parse_error("class A {\n  void f() {\n    5 = 6;\n  }\n}\n");
    assert_eq!(output, "[line 3] Error at '=': Invalid assignment target.\n");
}
