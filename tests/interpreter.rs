use manifast::{
    ExecutionStatus, InterpreterConfig, execute, execute_with_config,
    diagnostics::ManifastError,
    runtime::Interpreter,
    value::{Value, ValueKind},
};

fn eval(source: &str) -> Value {
    let mut interpreter = Interpreter::new();
    interpreter
        .eval_source(source)
        .expect("evaluation should succeed")
}

fn eval_error(source: &str) -> ManifastError {
    let mut interpreter = Interpreter::new();
    match interpreter.eval_source(source) {
        Ok(value) => panic!("expected error, received value {value}"),
        Err(err) => err,
    }
}

fn expect_number(value: &Value) -> f64 {
    match value.0.as_ref() {
        ValueKind::Number(n) => *n,
        _ => panic!("expected angka, found {}", value.type_name()),
    }
}

fn expect_string(value: &Value) -> &str {
    match value.0.as_ref() {
        ValueKind::String(s) => s,
        _ => panic!("expected string, found {}", value.type_name()),
    }
}

#[test]
fn evaluates_arithmetic_with_precedence() {
    let value = eval("kembali 2 + 3 * 4 - 6 / 2");
    assert_eq!(expect_number(&value), 11.0);
}

#[test]
fn returns_last_expression_from_script() {
    let value = eval(
        r#"
        lokal x = 40
        x + 2
        "#,
    );
    assert_eq!(expect_number(&value), 42.0);
}

#[test]
fn tipe_reports_fixed_type_names() {
    let output = execute(r#"println(tipe(1), tipe(2.5), tipe("s"), tipe(benar), tipe(nil), tipe([1]), tipe(print))"#);
    assert_eq!(output, "angka\tangka\tstring\tbool\tnil\tlarik\tfungsi\n");
}

#[test]
fn logical_operators_short_circuit() {
    let output = execute(
        r#"
        lokal dipanggil = salah
        fungsi f()
            dipanggil = benar
            kembali benar
        tutup
        lokal x = benar atau f()
        lokal y = salah dan f()
        println(x, y, dipanggil)
        "#,
    );
    assert_eq!(output, "benar\tsalah\tsalah\n");
}

#[test]
fn string_module_substring_and_split() {
    let output = execute(
        r#"
        lokal str = impor("string")
        println(str.substring("ManifastLuarBiasa", 1, 8))
        lokal p = str.split("Luar,Biasa", ",")
        println(p[1], p[2], len(p))
        "#,
    );
    assert_eq!(output, "Manifast\nLuar\tBiasa\t2\n");
}

#[test]
fn substring_out_of_range_is_runtime_error() {
    let output = execute(
        r#"
        lokal str = impor("string")
        str.substring("abc", 2, 9)
        "#,
    );
    assert!(output.contains("[ERROR RUNTIME]"), "{output}");
    assert!(output.contains("substring range 2..9"), "{output}");
}

#[test]
fn slices_are_inclusive_copies() {
    let output = execute(
        r#"
        lokal data = [10, 20, 30, 40, 50]
        println(data[2:4], data[:2], data[4:])
        lokal potong = data[1:2]
        potong[1] = 99
        println(data[1], potong[1], len(data[3:2]))
        "#,
    );
    assert_eq!(output, "[20, 30, 40]\t[10, 20]\t[40, 50]\n10\t99\t0\n");
}

#[test]
fn math_module_functions() {
    let output = execute(
        r#"
        lokal math = impor("math")
        println(math.sqrt(16), math.pow(2, 3), math.floor(4.9), math.ceil(4.1), math.abs(-5.5))
        println(math.sqrt(16) == 4, math.max(1, 7, 3), math.min(4, -2))
        "#,
    );
    assert_eq!(output, "4\t8\t4\t5\t5.5\nbenar\t7\t-2\n");
}

#[test]
fn recursive_fibonacci_completes() {
    let output = execute(
        r#"
        fungsi fib(n)
            jika n < 2 maka kembali n tutup
            kembali fib(n - 1) + fib(n - 2)
        tutup
        println(fib(21))
        "#,
    );
    assert_eq!(output, "10946\n");
}

#[test]
fn class_instantiation_runs_constructor() {
    let output = execute(
        r#"
        kelas Orang maka
            fungsi inisiasi(nama, umur) self.nama = nama; self.umur = umur tutup
            fungsi sapa() kembali "Halo, " + self.nama tutup
        tutup
        lokal b = Orang("Budi", 25)
        println(tipe(b), b.nama, b.umur, b.sapa())
        println(b, Orang)
        "#,
    );
    assert_eq!(
        output,
        "Orang\tBudi\t25\tHalo, Budi\n<Orang instance>\t<kelas Orang>\n"
    );
}

#[test]
fn instances_do_not_share_fields() {
    let output = execute(
        r#"
        kelas Kotak maka fungsi inisiasi(v) self.v = v tutup tutup
        lokal a = Kotak(1)
        lokal b = Kotak(2)
        a.v = 10
        println(a.v, b.v)
        "#,
    );
    assert_eq!(output, "10\t2\n");
}

#[test]
fn class_without_constructor_ignores_arguments() {
    let value = eval(
        r#"
        kelas Kosong tutup
        lokal k = Kosong(1, 2)
        tipe(k)
        "#,
    );
    assert_eq!(expect_string(&value), "Kosong");
}

#[test]
fn constructor_arity_mismatch_is_reported() {
    let err = eval_error(
        r#"
        kelas A maka fungsi inisiasi(x) self.x = x tutup tutup
        A()
        "#,
    );
    let message = err.to_string();
    assert!(
        message.contains("`inisiasi` expected 1 arguments but received 0"),
        "{message}"
    );
}

#[test]
fn unbound_method_takes_receiver_first() {
    let output = execute(
        r#"
        kelas Titik maka
            fungsi inisiasi(x) self.x = x tutup
            fungsi ambil() kembali self.x tutup
        tutup
        lokal t = Titik(7)
        lokal f = Titik.ambil
        lokal g = t.ambil
        println(f(t), g())
        "#,
    );
    assert_eq!(output, "7\t7\n");
}

#[test]
fn arithmetic_on_instances_uses_operator_methods() {
    let output = execute(
        r#"
        kelas Vektor maka
            fungsi inisiasi(x, y) self.x = x; self.y = y tutup
            fungsi __jumlah(lain) kembali Vektor(self.x + lain.x, self.y + lain.y) tutup
        tutup
        lokal v = Vektor(1, 2) + Vektor(3, 4)
        println(v.x, v.y)
        "#,
    );
    assert_eq!(output, "4\t6\n");
}

#[test]
fn closures_share_captured_variables() {
    let output = execute(
        r#"
        fungsi buatPenghitung()
            lokal n = 0
            kembali fungsi()
                n = n + 1
                kembali n
            tutup
        tutup
        lokal c = buatPenghitung()
        lokal d = buatPenghitung()
        c()
        c()
        println(c(), d())

        lokal x = 1
        fungsi lihat() kembali x tutup
        x = 5
        println(lihat())
        "#,
    );
    assert_eq!(output, "3\t1\n5\n");
}

#[test]
fn scoping_is_lexical() {
    let output = execute(
        r#"
        lokal x = "global"
        fungsi baca() kembali x tutup
        fungsi panggil()
            lokal x = "lokal"
            kembali baca()
        tutup
        println(panggil())
        lakukan
            lokal x = "blok"
        tutup
        println(x)
        "#,
    );
    assert_eq!(output, "global\nglobal\n");
}

#[test]
fn assignment_to_undeclared_name_creates_global() {
    let output = execute(
        r#"
        fungsi set() hasil = 42 tutup
        set()
        println(hasil)
        "#,
    );
    assert_eq!(output, "42\n");
}

#[test]
fn if_else_chains() {
    let output = execute(
        r#"
        fungsi nilai(n)
            jika n >= 90 maka kembali "A"
            kalau n >= 75 maka kembali "B"
            sebaliknya jika n >= 60 maka kembali "C"
            sebaliknya kembali "D"
            tutup
        tutup
        println(nilai(95), nilai(80), nilai(65), nilai(10))

        lokal diff = -3
        jika (diff < 0) diff = 0 - diff tutup
        println(diff)
        "#,
    );
    assert_eq!(output, "A\tB\tC\tD\n3\n");
}

#[test]
fn loops_count_and_iterate() {
    let output = execute(
        r#"
        lokal total = 0
        untuk i = 1 ke 5 lakukan total = total + i tutup
        lokal turun = ""
        untuk i = 3 ke 1 langkah -1 lakukan turun = turun + i tutup
        lokal n = 0
        selama n < 3 lakukan n += 1 tutup
        println(total, turun, n)
        "#,
    );
    assert_eq!(output, "15\t321\t3\n");
}

#[test]
fn for_loop_binding_is_fresh_per_iteration() {
    let output = execute(
        r#"
        lokal fs = []
        untuk i = 1 ke 3 lakukan fs[i] = fungsi() kembali i tutup tutup
        println(fs[1](), fs[3](), len(fs))
        "#,
    );
    assert_eq!(output, "1\t3\t3\n");
}

#[test]
fn zero_step_is_rejected() {
    let err = eval_error("untuk i = 1 ke 3 langkah 0 lakukan tutup");
    assert!(err.to_string().contains("step must not be zero"), "{err}");
}

#[test]
fn compound_assignment_on_members_and_indices() {
    let output = execute(
        r#"
        lokal a = [1, 2]
        a[2] += 5
        kelas K maka fungsi inisiasi() self.n = 1 tutup tutup
        lokal k = K()
        k.n *= 4
        println(a[2], k.n)
        "#,
    );
    assert_eq!(output, "7\t4\n");
}

#[test]
fn index_assignment_appends_only_at_end() {
    let output = execute(
        r#"
        lokal a = []
        a[1] = "x"
        a[2] = "y"
        println(a)
        a[5] = "z"
        "#,
    );
    assert!(output.starts_with("[x, y]\n[ERROR RUNTIME]"), "{output}");
    assert!(output.contains("index 5 out of bounds for array of length 2"), "{output}");
}

#[test]
fn strings_index_and_slice_by_character() {
    let output = execute(
        r#"
        lokal s = "Manifast"
        println(s[1], s[2:4], len(s))
        "#,
    );
    assert_eq!(output, "M\tani\t8\n");
}

#[test]
fn number_rendering_and_concatenation() {
    let output = execute(
        r#"
        println(10 / 4, 7 % 3, 2 * 3.5, -7 % 3)
        println("n=" + 1.5 + " b=" + benar + " " + nil)
        println(0x10, 0b101, 1_000, 1.5e3)
        "#,
    );
    assert_eq!(output, "2.5\t1\t7\t-1\nn=1.5 b=benar nil\n16\t5\t1000\t1500\n");
}

#[test]
fn equality_is_by_value_for_primitives_only() {
    let output = execute(
        r#"
        lokal a = [1]
        println(1 == 1, "a" == "a", [1] == [1], a == a, nil == salah, 1 != "1")
        println("abc" < "abd", 2 <= 2)
        "#,
    );
    assert_eq!(output, "benar\tbenar\tsalah\tbenar\tsalah\tbenar\nbenar\tbenar\n");
}

#[test]
fn print_joins_arguments_without_newline() {
    let output = execute(
        r#"
        print(1, 2)
        print("x")
        println()
        "#,
    );
    assert_eq!(output, "1\t2x\n");
}

#[test]
fn comments_are_ignored() {
    let output = execute("-- komentar\n--[[ blok\n komentar ]]\nprintln(1) -- akhir\n");
    assert_eq!(output, "1\n");
}

#[test]
fn os_clock_is_monotonic() {
    let output = execute(
        r#"
        lokal os = impor("os")
        lokal a = os.waktuNano()
        lokal b = os.waktuNano()
        println(b >= a, tipe(os.waktu()))
        "#,
    );
    assert_eq!(output, "benar\tangka\n");
}

#[test]
fn failed_assert_reports_assertion_marker_only() {
    let output = execute(
        r#"
        println("sebelum")
        assert(salah, "msg")
        println("sesudah")
        "#,
    );
    assert_eq!(output, "sebelum\n[ASSERT GAGAL] Assertion Failed: msg\n");
    assert!(!output.contains("[ERROR RUNTIME]"));
}

#[test]
fn passing_assert_is_silent() {
    let output = execute("assert(1 == 1, \"tidak terlihat\")\nprintln(\"ok\")");
    assert_eq!(output, "ok\n");
}

#[test]
fn out_of_range_index_reports_runtime_marker() {
    let output = execute("lokal a = [1, 2]\nprintln(a[3])");
    assert!(output.contains("[ERROR RUNTIME] runtime error at 2:"), "{output}");
    assert!(output.contains("index 3 out of bounds"), "{output}");
    assert!(!output.contains("Assertion Failed"), "{output}");
}

#[test]
fn output_before_error_is_kept() {
    let output = execute("print(\"a\")\nprintln(nil + 1)\nprintln(\"b\")");
    assert!(output.starts_with("a\n[ERROR RUNTIME]"), "{output}");
    assert!(output.contains("cannot apply `+` to nil and angka"), "{output}");
    assert!(!output.contains("\nb\n"), "{output}");
}

#[test]
fn runtime_error_taxonomy() {
    let cases = [
        ("println(1 / 0)", "division by zero"),
        ("println(5 % 0)", "modulo by zero"),
        ("println(tidakAda)", "undefined variable `tidakAda`"),
        ("impor(\"fs\")", "unknown module `fs`"),
        ("lokal m = impor(\"math\")\nm.tidakAda", "module `math` has no member `tidakAda`"),
        ("lokal x = 1\nx()", "value of type angka is not callable"),
        ("fungsi f(a) kembali a tutup\nf(1, 2)", "expected 1 arguments but received 2"),
        ("println(self)", "`self` used outside of a method"),
        ("println(-\"a\")", "cannot negate value of type string"),
        ("println(1 < \"a\")", "cannot apply `<` to angka and string"),
    ];
    for (source, expected) in cases {
        let output = execute(source);
        assert!(output.contains("[ERROR RUNTIME]"), "{source}: {output}");
        assert!(output.contains(expected), "{source}: {output}");
    }
}

#[test]
fn syntax_errors_use_runtime_marker() {
    let parse = execute("lokal = 3");
    assert!(parse.starts_with("[ERROR RUNTIME] parse error at 1:7"), "{parse}");
    let lexical = execute("lokal a = @");
    assert!(lexical.starts_with("[ERROR RUNTIME] lexical error"), "{lexical}");
}

#[test]
fn unbounded_recursion_hits_depth_limit() {
    let outcome = execute_with_config(
        r#"
        fungsi selamanya(n) kembali selamanya(n + 1) tutup
        selamanya(0)
        "#,
        InterpreterConfig::default(),
    );
    match outcome.status {
        ExecutionStatus::RuntimeError(message) => {
            assert!(message.contains("maximum recursion depth exceeded"), "{message}")
        }
        other => panic!("unexpected status {other:?}"),
    }
}

#[test]
fn step_budget_stops_infinite_loop() {
    let outcome = execute_with_config(
        "println(1)\nselama benar lakukan tutup",
        InterpreterConfig::new().with_step_budget(Some(100)),
    );
    assert_eq!(outcome.output, "1\n");
    match &outcome.status {
        ExecutionStatus::RuntimeError(message) => {
            assert!(message.contains("step budget of 100 exhausted"), "{message}")
        }
        other => panic!("unexpected status {other:?}"),
    }
    assert!(!outcome.is_ok());
}

#[test]
fn structured_outcome_classifies_assertions() {
    let outcome = execute_with_config("assert(bukan benar)", InterpreterConfig::default());
    assert_eq!(
        outcome.status,
        ExecutionStatus::AssertionFailure("assertion failed".into())
    );
    assert_eq!(outcome.output, "");
}

#[test]
fn executions_are_isolated() {
    assert_eq!(execute("lokal a = 1\nprintln(a)"), "1\n");
    let second = execute("println(a)");
    assert!(second.contains("undefined variable `a`"), "{second}");
}

#[test]
fn interpreter_keeps_globals_between_sources() {
    let mut interpreter = Interpreter::new();
    interpreter
        .eval_source("lokal a = 5\nfungsi dua(x) kembali x * 2 tutup")
        .expect("definitions evaluate");
    let value = interpreter.eval_source("dua(a)").expect("call evaluates");
    assert_eq!(expect_number(&value), 10.0);
    assert!(interpreter.global("dua").is_some());

    assert!(interpreter.eval_source("a[1]").is_err());
    let after_error = interpreter.eval_source("a + 1").expect("scope survives errors");
    assert_eq!(expect_number(&after_error), 6.0);
}

#[test]
fn modules_are_cached_per_interpreter() {
    let output = execute("println(impor(\"math\") == impor(\"math\"), impor(\"math\"))");
    assert_eq!(output, "benar\t<modul math>\n");
}

#[test]
fn conversion_natives() {
    let output = execute(
        r#"
        println(teks(12) + "!", angka("3.5") + 1, angka("x"), tipe(teks([1, 2])))
        "#,
    );
    assert_eq!(output, "12!\t4.5\tnil\tstring\n");
}

#[test]
fn deep_recursion_within_default_limit_completes() {
    let output = execute(
        r#"
        fungsi jumlah(n)
            jika n == 0 maka kembali 0 tutup
            kembali n + jumlah(n - 1)
        tutup
        println(jumlah(1000))
        "#,
    );
    assert_eq!(output, "500500\n");
}

#[test]
fn fractions_print_like_c_general_format() {
    let output = execute("println(0.1 + 0.2)\nprintln(1 / 3)\nprintln(\"x=\" + 2 / 3)");
    assert_eq!(output, "0.3\n0.333333\nx=0.666667\n");
}

#[test]
fn object_literal_fields_read_and_write_through_members() {
    let output = execute(
        r#"
        lokal o = { nama: "Budi", umur: 20 }
        println(o.nama, o.umur, tipe(o))
        o.umur += 1
        o.kota = "Bandung"
        println(o.umur, o.kota, o.tidak_ada)
        println(o)
        lokal kosong = {}
        println(tipe(kosong), kosong)
        "#,
    );
    assert_eq!(
        output,
        "Budi\t20\tobjek\n21\tBandung\tnil\n{nama: Budi, umur: 21, kota: Bandung}\nobjek\t{}\n"
    );
}

#[test]
fn objects_are_shared_references() {
    let output = execute(
        r#"
        lokal a = { n: 1 }
        lokal b = a
        b.n = 5
        println(a.n, a == b, a == { n: 5 })
        "#,
    );
    assert_eq!(output, "5\tbenar\tsalah\n");
}

#[test]
fn bitwise_operators_work_on_truncated_integers() {
    let output = execute(
        r#"
        println(6 & 3, 6 | 3, 6 ^ 3, ~5)
        println(1 << 4, -16 >> 2, 7.9 & 3)
        println((1 | 2) == 3, 1 + 1 << 2)
        "#,
    );
    assert_eq!(output, "2\t7\t5\t-6\n16\t-4\t3\nbenar\t8\n");
}

#[test]
fn bitwise_errors_are_runtime_errors() {
    let shift = execute("println(1 << 64)");
    assert!(
        shift.starts_with("[ERROR RUNTIME] runtime error at 1:9: shift amount 64 is outside 0..64"),
        "{shift}"
    );
    let operand = execute("println(\"a\" & 1)");
    assert!(operand.contains("cannot apply `&` to string and angka"), "{operand}");
}

#[test]
fn angka_rejects_non_decimal_spellings() {
    let output = execute(r#"println(angka("nan"), angka("inf"), angka("infinity"), angka("2e3"))"#);
    assert_eq!(output, "nil\tnil\tnil\t2000\n");
}
