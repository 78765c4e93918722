use clap::Parser;

/// Arguments for completions command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Generate bash completions:\n    omphalos completions bash > ~/.bash_completion.d/omphalos\n\n\
                  Generate zsh completions:\n    omphalos completions zsh > ~/.zfunc/_omphalos\n\n\
                  Generate fish completions:\n    omphalos completions fish > ~/.config/fish/completions/omphalos.fish\n\n\
                  Generate PowerShell completions:\n    omphalos completions powershell")]
pub struct CompletionsArgs {
    /// Shell type (bash, elvish, fish, powershell, zsh)
    pub shell: String,
}
