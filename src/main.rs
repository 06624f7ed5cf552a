fn main() -> pkgmirror::SnafuReport<pkgmirror::Error> {
    pkgmirror::mirror_main()
}
