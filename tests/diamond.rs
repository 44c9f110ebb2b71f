use scalargrad::Tape;

#[test]
fn main() {
    let tape = Tape::new();
    let a = tape.labeled("a", 1.);
    let b = tape.labeled("b", 3.);
    let c = tape.labeled("c", 5.);
    let ab = a + b;
    let ac = a + c;
    let abac = ab + ac;

    abac.backward();
    println!("abac: {abac:#?}");
    assert_eq!(abac.value(), 10.);
    assert_eq!(a.grad(), 2.);
    assert_eq!(b.grad(), 1.);
    assert_eq!(c.grad(), 1.);
}

#[test]
fn negated_diamond() {
    let tape = Tape::new();
    let a = tape.labeled("a", 1.);
    let a2 = -a;
    let b = tape.labeled("b", 3.);
    let c = tape.labeled("c", 5.);
    let abac = (a2 + b) + (a2 + c);

    abac.backward();
    assert_eq!(abac.value(), 6.);
    assert_eq!(a2.grad(), 2.);
    assert_eq!(a.grad(), -2.);
}
