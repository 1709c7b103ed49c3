use super::*;

// Splits a rendered command back into words the way a POSIX shell would, so the tests don't
// depend on shlex's choice of quoting style.
fn words(command: &RemoteCommand) -> Vec<String> {
    let shell = command.to_shell().unwrap();
    shlex::split(&shell).unwrap_or_else(|| panic!("unparseable shell string: {shell}"))
}

fn alice() -> AccountSpec {
    AccountSpec {
        name: "alice".into(),
        uid: 2001,
        gid: 2001,
        home: "/home/alice".into(),
        shell: "/bin/bash".into(),
        comment: "Alice Example,Room 4,,".into(),
    }
}

mod to_shell {
    use super::*;

    #[test]
    fn add_user_preserves_every_field() {
        assert_eq!(
            vec![
                "useradd",
                "-u",
                "2001",
                "-g",
                "2001",
                "-d",
                "/home/alice",
                "-s",
                "/bin/bash",
                "-c",
                "Alice Example,Room 4,,",
                "-M",
                "alice",
            ],
            words(&RemoteCommand::AddUser(alice())),
        );
    }

    #[test]
    fn empty_comment_is_still_an_argument() {
        let mut spec = alice();
        spec.comment.clear();
        let words = words(&RemoteCommand::AddUser(spec));
        let c = words.iter().position(|w| w == "-c").unwrap();
        assert_eq!("", words[c + 1]);
    }

    #[test]
    fn password_hash_is_passed_verbatim() {
        let hash = "$6$rounds=5000$sa'lt$a/b.c";
        let words = words(&RemoteCommand::SetPasswordHash {
            user: "alice".into(),
            hash: hash.into(),
        });
        assert_eq!("printf", words[0]);
        assert_eq!(format!("alice:{hash}"), words[2]);
        assert_eq!(vec!["|", "chpasswd", "-e"], words[3..]);
    }

    #[test]
    fn paths_with_spaces_stay_whole() {
        assert_eq!(
            vec!["tar", "-C", "/home/a b", "-cpf", "-", "."],
            words(&RemoteCommand::PackTree {
                path: "/home/a b".into()
            }),
        );
        assert_eq!(
            vec!["tar", "-C", "/home/a b", "-xpf", "-"],
            words(&RemoteCommand::UnpackTree {
                path: "/home/a b".into()
            }),
        );
    }

    #[test]
    fn chown_uses_numeric_ids() {
        assert_eq!(
            vec!["chown", "-R", "2001:2001", "/home/alice"],
            words(&RemoteCommand::Chown {
                path: "/home/alice".into(),
                uid: 2001,
                gid: 2001,
            }),
        );
    }

    #[test]
    fn secure_ssh_dir_sets_all_three_modes() {
        let words = words(&RemoteCommand::SecureSshDir {
            path: "/home/alice/.ssh".into(),
        });
        let joined = words.join(" ");
        assert!(joined.starts_with("chmod 700 /home/alice/.ssh && "));
        assert!(joined.contains("find /home/alice/.ssh -type f ! -name *.pub -exec chmod 600 {} +"));
        assert!(joined.contains("find /home/alice/.ssh -type f -name *.pub -exec chmod 644 {} +"));
    }

    #[test]
    fn shell_metacharacters_are_quoted() {
        let words = words(&RemoteCommand::LookupGroup {
            name: "x; rm -rf /".into(),
        });
        assert_eq!(vec!["getent", "group", "x; rm -rf /"], words);
    }

    #[test]
    fn nul_bytes_are_rejected() {
        assert!(RemoteCommand::MakeDir {
            path: "/tmp/\0".into()
        }
        .to_shell()
        .is_err());
    }
}

mod is_mutating {
    use super::*;

    #[test]
    fn lookups_are_read_only() {
        let commands = [
            RemoteCommand::LookupPasswd { user: "a".into() },
            RemoteCommand::LookupShadow { user: "a".into() },
            RemoteCommand::PrimaryGroup { user: "a".into() },
            RemoteCommand::Groups { user: "a".into() },
            RemoteCommand::LookupGroupById { gid: 1 },
            RemoteCommand::LookupGroup { name: "a".into() },
            RemoteCommand::DirExists { path: "/".into() },
            RemoteCommand::HasTool { tool: "getfacl".into() },
            RemoteCommand::PackTree { path: "/".into() },
            RemoteCommand::DumpAcl { path: "/".into() },
        ];
        for command in commands {
            assert!(!command.is_mutating(), "{command}");
        }
    }

    #[test]
    fn changes_are_mutating() {
        let commands = [
            RemoteCommand::AddGroup {
                name: "a".into(),
                gid: 1,
            },
            RemoteCommand::AddUser(alice()),
            RemoteCommand::SetPasswordHash {
                user: "a".into(),
                hash: "x".into(),
            },
            RemoteCommand::DeleteUser { user: "a".into() },
            RemoteCommand::MakeDir { path: "/".into() },
            RemoteCommand::Chown {
                path: "/".into(),
                uid: 1,
                gid: 1,
            },
            RemoteCommand::SecureSshDir { path: "/".into() },
            RemoteCommand::AddToGroup {
                user: "a".into(),
                group: "b".into(),
            },
            RemoteCommand::UnpackTree { path: "/".into() },
            RemoteCommand::RestoreAcl,
        ];
        for command in commands {
            assert!(command.is_mutating(), "{command}");
        }
    }
}

mod answers_no {
    use super::*;
    use crate::executor::fake::output;

    fn exit(code: i32) -> ExitStatus {
        output(code, "", "").status
    }

    #[test]
    fn getent_not_found() {
        let lookup = RemoteCommand::LookupPasswd { user: "a".into() };
        assert!(lookup.answers_no(exit(2)));
        assert!(!lookup.answers_no(exit(0)));
        assert!(!lookup.answers_no(exit(1)));
        assert!(!lookup.answers_no(exit(SSH_FAILURE)));
    }

    #[test]
    fn test_and_id_answer_with_one() {
        for command in [
            RemoteCommand::DirExists { path: "/".into() },
            RemoteCommand::Groups { user: "a".into() },
        ] {
            assert!(command.answers_no(exit(1)), "{command}");
            assert!(!command.answers_no(exit(SSH_FAILURE)), "{command}");
        }
    }

    #[test]
    fn missing_tool_is_any_code_but_ssh_failure() {
        let command = RemoteCommand::HasTool { tool: "setfacl".into() };
        assert!(command.answers_no(exit(1)));
        assert!(command.answers_no(exit(127)));
        assert!(!command.answers_no(exit(SSH_FAILURE)));
    }

    #[test]
    fn changes_never_answer_no() {
        assert!(!RemoteCommand::MakeDir { path: "/".into() }.answers_no(exit(1)));
    }
}

#[test]
fn display_hides_password_hash() {
    let command = RemoteCommand::SetPasswordHash {
        user: "alice".into(),
        hash: "$6$secret".into(),
    };
    let shown = command.to_string();
    assert!(!shown.contains("secret"));
    assert!(shown.contains("alice"));
}

#[test]
fn account_spec_display_lists_parameters() {
    assert_eq!(
        "alice (uid=2001, gid=2001, home=/home/alice, shell=/bin/bash, \
         comment=\"Alice Example,Room 4,,\")",
        alice().to_string(),
    );
}
