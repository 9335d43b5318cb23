pub fn line(message: impl AsRef<str>) {
    println!("{}", message.as_ref());
}

pub fn error(message: impl AsRef<str>) {
    eprintln!("{}", message.as_ref());
}
